use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use server_api::{
    create_todo, delete_todo, get_todo, list_todos, reorder_todos, snapshot_event,
    toggle_complete, update_todo,
};
use shared::{
    domain::{TodoId, TodoRecord},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateTodoRequest, ReorderRequest, ReorderResponse, ServerEvent, TodoIdResponse,
        UpdateTodoRequest,
    },
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, warn};

mod app_state;
pub mod config;

pub use app_state::AppState;

const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/todos", get(http_list_todos).post(http_create_todo))
        .route("/todos/reorder", post(http_reorder_todos))
        .route(
            "/todos/:todo_id",
            get(http_get_todo)
                .patch(http_update_todo)
                .delete(http_delete_todo),
        )
        .route("/todos/:todo_id/toggle", post(http_toggle_complete))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

fn reject(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(message = %err.message, "todo request failed");
    } else {
        debug!(code = ?err.code, message = %err.message, "todo request rejected");
    }
    (status, Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state.api.storage.health_check().await.map_err(|error| {
        warn!(%error, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok("ok")
}

async fn http_list_todos(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TodoRecord>> {
    let todos = list_todos(&state.api).await.map_err(reject)?;
    Ok(Json(todos))
}

async fn http_get_todo(
    State(state): State<Arc<AppState>>,
    Path(todo_id): Path<i64>,
) -> ApiResult<TodoRecord> {
    let todo = get_todo(&state.api, TodoId(todo_id)).await.map_err(reject)?;
    Ok(Json(todo))
}

async fn http_create_todo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTodoRequest>,
) -> ApiResult<TodoIdResponse> {
    let id = create_todo(&state.api, &req).await.map_err(reject)?;
    state.publish_snapshot().await;
    Ok(Json(TodoIdResponse { id }))
}

async fn http_update_todo(
    State(state): State<Arc<AppState>>,
    Path(todo_id): Path<i64>,
    Json(req): Json<UpdateTodoRequest>,
) -> ApiResult<TodoIdResponse> {
    let id = update_todo(&state.api, TodoId(todo_id), &req)
        .await
        .map_err(reject)?;
    state.publish_snapshot().await;
    Ok(Json(TodoIdResponse { id }))
}

async fn http_toggle_complete(
    State(state): State<Arc<AppState>>,
    Path(todo_id): Path<i64>,
) -> ApiResult<TodoIdResponse> {
    let id = toggle_complete(&state.api, TodoId(todo_id))
        .await
        .map_err(reject)?;
    state.publish_snapshot().await;
    Ok(Json(TodoIdResponse { id }))
}

async fn http_delete_todo(
    State(state): State<Arc<AppState>>,
    Path(todo_id): Path<i64>,
) -> ApiResult<TodoIdResponse> {
    let id = delete_todo(&state.api, TodoId(todo_id))
        .await
        .map_err(reject)?;
    state.publish_snapshot().await;
    Ok(Json(TodoIdResponse { id }))
}

async fn http_reorder_todos(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<ReorderResponse> {
    let todo_ids = reorder_todos(&state.api, req.todo_ids)
        .await
        .map_err(reject)?;
    state.publish_snapshot().await;
    Ok(Json(ReorderResponse { todo_ids }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

/// Sends the current snapshot on connect, then every published snapshot.
async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let initial = snapshot_event(&state.api).await;
    if send_event(&mut sender, &initial).await.is_err() {
        return;
    }

    let api = state.api.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "subscriber lagged; resending latest snapshot");
                    snapshot_event(&api).await
                }
                Err(RecvError::Closed) => break,
            };
            if send_event(&mut sender, &event).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

async fn send_event<S>(sender: &mut S, event: &ServerEvent) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(v) => v,
        Err(error) => {
            warn!(%error, "failed to encode server event");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

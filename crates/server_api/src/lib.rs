use shared::{
    domain::{TodoId, TodoRecord},
    error::{ApiError, ErrorCode},
    protocol::{CreateTodoRequest, ServerEvent, UpdateTodoRequest},
    validation::{ensure_unique_ids, normalize_create, normalize_update},
};
use storage::{ReorderOutcome, Storage};
use tracing::{debug, info};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_todos(ctx: &ApiContext) -> Result<Vec<TodoRecord>, ApiError> {
    ctx.storage.list_todos().await.map_err(internal)
}

pub async fn get_todo(ctx: &ApiContext, id: TodoId) -> Result<TodoRecord, ApiError> {
    ctx.storage
        .get_todo(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::todo_not_found(id))
}

pub async fn create_todo(ctx: &ApiContext, request: &CreateTodoRequest) -> Result<TodoId, ApiError> {
    let request = normalize_create(request)?;
    let id = ctx.storage.create_todo(&request).await.map_err(internal)?;
    info!(todo_id = id.0, "todo created");
    Ok(id)
}

pub async fn update_todo(
    ctx: &ApiContext,
    id: TodoId,
    request: &UpdateTodoRequest,
) -> Result<TodoId, ApiError> {
    let request = normalize_update(request)?;
    let found = ctx
        .storage
        .update_todo(id, &request)
        .await
        .map_err(internal)?;
    if !found {
        return Err(ApiError::todo_not_found(id));
    }
    debug!(todo_id = id.0, "todo updated");
    Ok(id)
}

pub async fn toggle_complete(ctx: &ApiContext, id: TodoId) -> Result<TodoId, ApiError> {
    let completed = ctx
        .storage
        .toggle_todo(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::todo_not_found(id))?;
    debug!(todo_id = id.0, completed, "todo toggled");
    Ok(id)
}

pub async fn delete_todo(ctx: &ApiContext, id: TodoId) -> Result<TodoId, ApiError> {
    let deleted = ctx.storage.delete_todo(id).await.map_err(internal)?;
    if !deleted {
        return Err(ApiError::todo_not_found(id));
    }
    info!(todo_id = id.0, "todo deleted");
    Ok(id)
}

/// Assigns `order = index` to each id. The batch is all-or-nothing.
pub async fn reorder_todos(ctx: &ApiContext, ids: Vec<TodoId>) -> Result<Vec<TodoId>, ApiError> {
    ensure_unique_ids(&ids)?;
    match ctx.storage.reorder_todos(&ids).await.map_err(internal)? {
        ReorderOutcome::Applied => {
            debug!(count = ids.len(), "todos reordered");
            Ok(ids)
        }
        ReorderOutcome::Missing(missing) => {
            let missing = missing
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            Err(ApiError::new(
                ErrorCode::NotFound,
                format!("cannot reorder unknown todos: {missing}"),
            ))
        }
    }
}

/// Current collection wrapped for the live feed.
pub async fn snapshot_event(ctx: &ApiContext) -> ServerEvent {
    match list_todos(ctx).await {
        Ok(todos) => ServerEvent::TodosSnapshot { todos },
        Err(err) => ServerEvent::Error(err),
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

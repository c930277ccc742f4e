use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use shared::{
    domain::{TodoId, TodoRecord},
    error::{ApiError, ErrorCode},
    protocol::{
        CreateTodoRequest, ReorderRequest, ReorderResponse, ServerEvent, TodoIdResponse,
        UpdateTodoRequest,
    },
};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ClientError;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The authoritative todo store as seen from a client.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list(&self) -> Result<Vec<TodoRecord>, ClientError>;
    async fn get(&self, id: TodoId) -> Result<TodoRecord, ClientError>;
    async fn create(&self, request: &CreateTodoRequest) -> Result<TodoId, ClientError>;
    async fn update(&self, id: TodoId, patch: &UpdateTodoRequest) -> Result<TodoId, ClientError>;
    async fn toggle_complete(&self, id: TodoId) -> Result<TodoId, ClientError>;
    async fn delete(&self, id: TodoId) -> Result<TodoId, ClientError>;
    /// Sets `order = index` for every id in `ids`.
    async fn reorder(&self, ids: &[TodoId]) -> Result<Vec<TodoId>, ClientError>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn list(&self) -> Result<Vec<TodoRecord>, ClientError> {
        (**self).list().await
    }

    async fn get(&self, id: TodoId) -> Result<TodoRecord, ClientError> {
        (**self).get(id).await
    }

    async fn create(&self, request: &CreateTodoRequest) -> Result<TodoId, ClientError> {
        (**self).create(request).await
    }

    async fn update(&self, id: TodoId, patch: &UpdateTodoRequest) -> Result<TodoId, ClientError> {
        (**self).update(id, patch).await
    }

    async fn toggle_complete(&self, id: TodoId) -> Result<TodoId, ClientError> {
        (**self).toggle_complete(id).await
    }

    async fn delete(&self, id: TodoId) -> Result<TodoId, ClientError> {
        (**self).delete(id).await
    }

    async fn reorder(&self, ids: &[TodoId]) -> Result<Vec<TodoId>, ClientError> {
        (**self).reorder(ids).await
    }
}

/// Pushed by the server over `/ws`.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Snapshot(Vec<TodoRecord>),
    Error(String),
}

/// Live snapshot feed from `/ws`. Dropping it closes the socket.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<StoreEvent>,
    reader: JoinHandle<()>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Result<StoreEvent, RecvError> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// `RemoteStore` backed by the todo server's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpTodoStore {
    http: Client,
    server_url: String,
}

impl HttpTodoStore {
    pub fn new(server_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: impl Into<String>) -> Result<Self, ClientError> {
        let server_url = server_url.into();
        let parsed = Url::parse(&server_url)
            .map_err(|err| ClientError::Transport(format!("invalid server url {server_url}: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Transport(format!(
                "server url must start with http:// or https://, got {server_url}"
            )));
        }
        Ok(Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn todos_url(&self) -> String {
        format!("{}/todos", self.server_url)
    }

    fn todo_url(&self, id: TodoId) -> String {
        format!("{}/todos/{id}", self.server_url)
    }

    /// Opens `/ws` and forwards every pushed snapshot until the socket closes or
    /// the returned subscription is dropped.
    pub async fn subscribe(&self) -> Result<Subscription, ClientError> {
        let ws_url = if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{rest}/ws")
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{rest}/ws")
        } else {
            return Err(ClientError::Transport(format!(
                "server url must start with http:// or https://, got {}",
                self.server_url
            )));
        };

        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|err| ClientError::Transport(format!("failed to connect websocket {ws_url}: {err}")))?;
        info!(%ws_url, "subscribed to todo snapshots");

        let (_, mut ws_reader) = ws_stream.split();
        let (events, receiver) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(ServerEvent::TodosSnapshot { todos }) => {
                            if events.send(StoreEvent::Snapshot(todos)).is_err() {
                                debug!("no snapshot subscribers left; closing websocket reader");
                                break;
                            }
                        }
                        Ok(ServerEvent::Error(err)) => {
                            let _ = events.send(StoreEvent::Error(err.message));
                        }
                        Err(err) => {
                            let _ = events.send(StoreEvent::Error(format!("invalid server event: {err}")));
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(%err, "websocket receive failed");
                        let _ = events.send(StoreEvent::Error(format!("websocket receive failed: {err}")));
                        break;
                    }
                }
            }
        });

        Ok(Subscription { receiver, reader })
    }
}

/// Turns a non-success response into the client error taxonomy. The body is
/// read as an `ApiError` when the server sent one.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let err = match response.json::<ApiError>().await {
        Ok(err) => err,
        Err(_) => ApiError::new(
            if status == reqwest::StatusCode::NOT_FOUND {
                ErrorCode::NotFound
            } else {
                ErrorCode::Internal
            },
            format!("server responded with {status}"),
        ),
    };

    Err(match err.code {
        ErrorCode::NotFound => ClientError::NotFound(err.message),
        _ => ClientError::Rejected(err),
    })
}

#[async_trait]
impl RemoteStore for HttpTodoStore {
    async fn list(&self) -> Result<Vec<TodoRecord>, ClientError> {
        let response = self.http.get(self.todos_url()).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn get(&self, id: TodoId) -> Result<TodoRecord, ClientError> {
        let response = self.http.get(self.todo_url(id)).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn create(&self, request: &CreateTodoRequest) -> Result<TodoId, ClientError> {
        let response = self.http.post(self.todos_url()).json(request).send().await?;
        let created: TodoIdResponse = check(response).await?.json().await?;
        Ok(created.id)
    }

    async fn update(&self, id: TodoId, patch: &UpdateTodoRequest) -> Result<TodoId, ClientError> {
        let response = self.http.patch(self.todo_url(id)).json(patch).send().await?;
        let updated: TodoIdResponse = check(response).await?.json().await?;
        Ok(updated.id)
    }

    async fn toggle_complete(&self, id: TodoId) -> Result<TodoId, ClientError> {
        let response = self
            .http
            .post(format!("{}/toggle", self.todo_url(id)))
            .send()
            .await?;
        let toggled: TodoIdResponse = check(response).await?.json().await?;
        Ok(toggled.id)
    }

    async fn delete(&self, id: TodoId) -> Result<TodoId, ClientError> {
        let response = self.http.delete(self.todo_url(id)).send().await?;
        let deleted: TodoIdResponse = check(response).await?.json().await?;
        Ok(deleted.id)
    }

    async fn reorder(&self, ids: &[TodoId]) -> Result<Vec<TodoId>, ClientError> {
        let response = self
            .http
            .post(format!("{}/reorder", self.todos_url()))
            .json(&ReorderRequest {
                todo_ids: ids.to_vec(),
            })
            .send()
            .await?;
        let reordered: ReorderResponse = check(response).await?.json().await?;
        Ok(reordered.todo_ids)
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;

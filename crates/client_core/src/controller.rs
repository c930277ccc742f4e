use shared::{
    domain::{TodoFilter, TodoId, TodoRecord, ViewFilter},
    protocol::{CreateTodoRequest, UpdateTodoRequest},
    validation::{normalize_create, normalize_update},
};
use tracing::{debug, error, info};

use crate::{
    drag::DragSession,
    error::ClientError,
    reconciler::{apply_pending_order, ListReconciler, ReorderScope},
    remote::RemoteStore,
};

/// Client state for one todo list session.
///
/// Holds the last snapshot confirmed by the store together with the view
/// settings, the drag gesture and any reorder not yet confirmed.
pub struct TodoController<S> {
    store: S,
    reconciler: ListReconciler,
    view_filter: ViewFilter,
    drag: DragSession,
    pending_order: Option<Vec<TodoId>>,
    scope: ReorderScope,
}

impl<S: RemoteStore> TodoController<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            reconciler: ListReconciler::default(),
            view_filter: ViewFilter::default(),
            drag: DragSession::new(),
            pending_order: None,
            scope: ReorderScope::default(),
        }
    }

    pub fn with_scope(mut self, scope: ReorderScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scope(&self) -> ReorderScope {
        self.scope
    }

    pub fn view_filter(&self) -> &ViewFilter {
        &self.view_filter
    }

    pub fn pending_order(&self) -> Option<&[TodoId]> {
        self.pending_order.as_deref()
    }

    pub fn snapshot(&self) -> &[TodoRecord] {
        self.reconciler.records()
    }

    pub fn drag(&self) -> &DragSession {
        &self.drag
    }

    /// Replaces the authoritative snapshot. Any optimistic order is dropped.
    pub fn apply_snapshot(&mut self, records: Vec<TodoRecord>) {
        debug!(count = records.len(), "applying todo snapshot");
        self.reconciler.replace(records);
        self.pending_order = None;
    }

    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let records = self.store.list().await.map_err(|err| {
            error!(%err, "failed to load todos");
            err
        })?;
        self.apply_snapshot(records);
        Ok(())
    }

    /// The list as it should be displayed. While a drag is active this is the
    /// in-progress sequence.
    pub fn view(&self) -> Vec<TodoRecord> {
        if let Some(sequence) = self.drag.sequence() {
            return sequence.to_vec();
        }
        let view = self.reconciler.view(&self.view_filter);
        match &self.pending_order {
            Some(pending) => apply_pending_order(view, pending),
            None => view,
        }
    }

    pub fn set_filter(&mut self, filter: TodoFilter) {
        self.view_filter.filter = filter;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.view_filter.search_query = query.into();
    }

    pub async fn get(&self, id: TodoId) -> Result<TodoRecord, ClientError> {
        self.store.get(id).await.map_err(|err| {
            error!(todo_id = id.0, %err, "failed to load todo");
            err
        })
    }

    pub async fn add(&mut self, draft: &CreateTodoRequest) -> Result<TodoId, ClientError> {
        let draft = normalize_create(draft)?;
        let id = self.store.create(&draft).await.map_err(|err| {
            error!(title = %draft.title, %err, "failed to add todo");
            err
        })?;
        info!(todo_id = id.0, "todo added");
        Ok(id)
    }

    pub async fn edit(&mut self, id: TodoId, patch: &UpdateTodoRequest) -> Result<TodoId, ClientError> {
        let patch = normalize_update(patch)?;
        self.store.update(id, &patch).await.map_err(|err| {
            error!(todo_id = id.0, %err, "failed to update todo");
            err
        })
    }

    pub async fn toggle(&mut self, id: TodoId) -> Result<TodoId, ClientError> {
        self.store.toggle_complete(id).await.map_err(|err| {
            error!(todo_id = id.0, %err, "failed to toggle todo");
            err
        })
    }

    pub async fn delete(&mut self, id: TodoId) -> Result<TodoId, ClientError> {
        self.store.delete(id).await.map_err(|err| {
            error!(todo_id = id.0, %err, "failed to delete todo");
            err
        })
    }

    pub fn begin_drag(&mut self, id: TodoId) -> Result<(), ClientError> {
        let view = self.view();
        self.drag.begin(id, &view)?;
        Ok(())
    }

    pub fn drag_to(&mut self, index: usize) -> Result<usize, ClientError> {
        Ok(self.drag.move_to(index)?)
    }

    pub fn cancel_drag(&mut self) -> Result<(), ClientError> {
        self.drag.cancel()?;
        Ok(())
    }

    /// Releases the drag and sends the new order. The optimistic order is kept
    /// even when the store call fails; the next snapshot replaces it.
    pub async fn commit_drag(&mut self) -> Result<Vec<TodoId>, ClientError> {
        let displayed = self.drag.release()?;
        let ids = self.reconciler.reorder_ids(&displayed, self.scope);
        self.pending_order = Some(ids.clone());

        self.store.reorder(&ids).await.map_err(|err| {
            error!(count = ids.len(), %err, "failed to reorder todos");
            err
        })
    }

    /// A whole drag gesture in one call: pick up `id`, drop it at `index`.
    pub async fn move_item(&mut self, id: TodoId, index: usize) -> Result<Vec<TodoId>, ClientError> {
        self.begin_drag(id)?;
        if let Err(err) = self.drag_to(index) {
            let _ = self.drag.cancel();
            return Err(err);
        }
        self.commit_drag().await
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

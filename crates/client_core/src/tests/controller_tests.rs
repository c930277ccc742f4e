use super::*;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared::validation::ValidationError;

use crate::error::DragError;

#[derive(Default)]
struct FakeState {
    todos: Vec<TodoRecord>,
    calls: Vec<String>,
    fail_reorder: bool,
    next_id: i64,
}

#[derive(Clone, Default)]
struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

impl FakeStore {
    fn seeded(titles: &[(&str, bool)]) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            for (index, (title, completed)) in titles.iter().enumerate() {
                let id = index as i64 + 1;
                state.todos.push(TodoRecord {
                    id: TodoId(id),
                    title: title.to_string(),
                    description: None,
                    due_date: None,
                    completed: *completed,
                    created_at: id,
                    order: index as i64,
                });
            }
            state.next_id = titles.len() as i64 + 1;
        }
        store
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn fail_reorders(&self) {
        self.state.lock().unwrap().fail_reorder = true;
    }

    fn missing(id: TodoId) -> ClientError {
        ClientError::NotFound(format!("todo {id} not found"))
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn list(&self) -> Result<Vec<TodoRecord>, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list".into());
        Ok(state.todos.clone())
    }

    async fn get(&self, id: TodoId) -> Result<TodoRecord, ClientError> {
        let state = self.state.lock().unwrap();
        state
            .todos
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| Self::missing(id))
    }

    async fn create(&self, request: &CreateTodoRequest) -> Result<TodoId, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", request.title));
        let id = TodoId(state.next_id);
        state.next_id += 1;
        let order = state.todos.iter().map(|t| t.order).max().map_or(0, |m| m + 1);
        state.todos.push(TodoRecord {
            id,
            title: request.title.clone(),
            description: request.description.clone(),
            due_date: request.due_date,
            completed: false,
            created_at: id.0,
            order: request.order.unwrap_or(order),
        });
        Ok(id)
    }

    async fn update(&self, id: TodoId, patch: &UpdateTodoRequest) -> Result<TodoId, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update {id}"));
        let todo = state
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Self::missing(id))?;
        if let Some(title) = &patch.title {
            todo.title = title.clone();
        }
        if patch.clear_description {
            todo.description = None;
        } else if let Some(description) = &patch.description {
            todo.description = Some(description.clone());
        }
        Ok(id)
    }

    async fn toggle_complete(&self, id: TodoId) -> Result<TodoId, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("toggle {id}"));
        let todo = state
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Self::missing(id))?;
        todo.completed = !todo.completed;
        Ok(id)
    }

    async fn delete(&self, id: TodoId) -> Result<TodoId, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {id}"));
        let before = state.todos.len();
        state.todos.retain(|t| t.id != id);
        if state.todos.len() == before {
            return Err(Self::missing(id));
        }
        Ok(id)
    }

    async fn reorder(&self, ids: &[TodoId]) -> Result<Vec<TodoId>, ClientError> {
        let mut state = self.state.lock().unwrap();
        let joined: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        state.calls.push(format!("reorder {}", joined.join(",")));
        if state.fail_reorder {
            return Err(ClientError::Transport("connection reset".into()));
        }
        for (index, id) in ids.iter().enumerate() {
            if let Some(todo) = state.todos.iter_mut().find(|t| t.id == *id) {
                todo.order = index as i64;
            }
        }
        Ok(ids.to_vec())
    }
}

fn view_titles<S: RemoteStore>(controller: &TodoController<S>) -> Vec<String> {
    controller.view().into_iter().map(|t| t.title).collect()
}

async fn loaded(titles: &[(&str, bool)]) -> (TodoController<FakeStore>, FakeStore) {
    let store = FakeStore::seeded(titles);
    let mut controller = TodoController::new(store.clone());
    controller.refresh().await.expect("refresh");
    (controller, store)
}

#[tokio::test]
async fn buy_milk_pay_bills_scenario() {
    let (mut controller, _store) = loaded(&[]).await;

    controller
        .add(&CreateTodoRequest {
            title: "Buy milk".into(),
            ..CreateTodoRequest::default()
        })
        .await
        .expect("add milk");
    controller
        .add(&CreateTodoRequest {
            title: "Pay bills".into(),
            ..CreateTodoRequest::default()
        })
        .await
        .expect("add bills");
    controller.refresh().await.expect("refresh");
    assert_eq!(view_titles(&controller), vec!["Buy milk", "Pay bills"]);

    let bills = controller.view()[1].id;
    controller.move_item(bills, 0).await.expect("move");
    assert_eq!(view_titles(&controller), vec!["Pay bills", "Buy milk"]);

    controller.refresh().await.expect("refresh");
    assert_eq!(view_titles(&controller), vec!["Pay bills", "Buy milk"]);
    assert!(controller.pending_order().is_none());

    let milk = controller.view()[1].id;
    controller.toggle(milk).await.expect("toggle");
    controller.refresh().await.expect("refresh");
    controller.set_filter(TodoFilter::Active);
    assert_eq!(view_titles(&controller), vec!["Pay bills"]);
}

#[tokio::test]
async fn completed_item_hidden_by_active_filter_then_dragged_to_the_top() {
    let (mut controller, store) = loaded(&[("Buy milk", false), ("Pay bills", true)]).await;
    let (a, b) = (TodoId(1), TodoId(2));

    controller.set_filter(TodoFilter::Active);
    controller.set_search_query("");
    let active: Vec<TodoId> = controller.view().iter().map(|t| t.id).collect();
    assert_eq!(active, vec![a]);

    controller.set_filter(TodoFilter::All);
    let sent = controller.move_item(b, 0).await.expect("move");
    assert_eq!(sent, vec![b, a]);
    assert_eq!(store.calls().last().map(String::as_str), Some("reorder 2,1"));

    controller.refresh().await.expect("refresh");
    let order_of = |id: TodoId| {
        controller
            .snapshot()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.order)
    };
    assert_eq!(order_of(b), Some(0));
    assert_eq!(order_of(a), Some(1));
    assert_eq!(view_titles(&controller), vec!["Pay bills", "Buy milk"]);
}

#[tokio::test]
async fn validation_failures_never_reach_the_store() {
    let (mut controller, store) = loaded(&[("Buy milk", false)]).await;

    let err = controller
        .add(&CreateTodoRequest {
            title: "   ".into(),
            ..CreateTodoRequest::default()
        })
        .await
        .expect_err("blank title");
    assert!(matches!(err, ClientError::Validation(ValidationError::EmptyTitle)));

    let err = controller
        .edit(
            TodoId(1),
            &UpdateTodoRequest {
                title: Some("x".repeat(101)),
                ..UpdateTodoRequest::default()
            },
        )
        .await
        .expect_err("long title");
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::TitleTooLong { len: 101 })
    ));

    assert_eq!(store.calls(), vec!["list".to_string()]);
}

#[tokio::test]
async fn add_trims_before_sending() {
    let (mut controller, store) = loaded(&[]).await;
    controller
        .add(&CreateTodoRequest {
            title: "  Water plants  ".into(),
            description: Some("   ".into()),
            ..CreateTodoRequest::default()
        })
        .await
        .expect("add");

    assert_eq!(store.calls().last().map(String::as_str), Some("create Water plants"));
    let record = controller.get(TodoId(1)).await.expect("get");
    assert_eq!(record.description, None);
}

#[tokio::test]
async fn only_one_drag_at_a_time() {
    let (mut controller, _store) = loaded(&[("a", false), ("b", false)]).await;

    controller.begin_drag(TodoId(1)).expect("begin");
    let err = controller.begin_drag(TodoId(2)).expect_err("second drag");
    assert!(matches!(
        err,
        ClientError::Drag(DragError::AlreadyDragging { active: TodoId(1) })
    ));
}

#[tokio::test]
async fn view_follows_the_drag_in_progress() {
    let (mut controller, store) = loaded(&[("a", false), ("b", false), ("c", false)]).await;

    controller.begin_drag(TodoId(3)).expect("begin");
    controller.drag_to(0).expect("move");
    assert_eq!(view_titles(&controller), vec!["c", "a", "b"]);

    controller.cancel_drag().expect("cancel");
    assert_eq!(view_titles(&controller), vec!["a", "b", "c"]);
    assert!(controller.pending_order().is_none());
    assert!(!store.calls().iter().any(|c| c.starts_with("reorder")));
}

#[tokio::test]
async fn failed_reorder_keeps_the_optimistic_order_until_next_snapshot() {
    let (mut controller, store) = loaded(&[("a", false), ("b", false), ("c", false)]).await;
    store.fail_reorders();

    let err = controller.move_item(TodoId(3), 0).await.expect_err("reorder fails");
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(view_titles(&controller), vec!["c", "a", "b"]);
    assert_eq!(
        controller.pending_order(),
        Some(&[TodoId(3), TodoId(1), TodoId(2)][..])
    );

    controller.refresh().await.expect("refresh");
    assert_eq!(view_titles(&controller), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn visible_only_scope_sends_just_the_filtered_ids() {
    let (mut controller, store) =
        loaded(&[("a", false), ("b", true), ("c", false), ("d", true)]).await;
    controller.set_filter(TodoFilter::Active);

    controller.move_item(TodoId(3), 0).await.expect("move");

    assert_eq!(store.calls().last().map(String::as_str), Some("reorder 3,1"));
}

#[tokio::test]
async fn full_collection_scope_keeps_hidden_slots() {
    let store = FakeStore::seeded(&[("a", false), ("b", true), ("c", false), ("d", true)]);
    let mut controller =
        TodoController::new(store.clone()).with_scope(ReorderScope::FullCollection);
    controller.refresh().await.expect("refresh");
    controller.set_filter(TodoFilter::Active);

    controller.move_item(TodoId(3), 0).await.expect("move");

    assert_eq!(store.calls().last().map(String::as_str), Some("reorder 3,2,1,4"));
    controller.refresh().await.expect("refresh");
    controller.set_filter(TodoFilter::All);
    assert_eq!(view_titles(&controller), vec!["c", "b", "a", "d"]);
}

#[tokio::test]
async fn search_narrows_the_view() {
    let (mut controller, _store) = loaded(&[("Buy milk", false), ("Pay bills", false)]).await;
    controller.set_search_query("  MILK ");
    assert_eq!(view_titles(&controller), vec!["Buy milk"]);
    assert!(controller.view_filter().is_narrowed());

    controller.set_search_query("");
    assert_eq!(view_titles(&controller).len(), 2);
}

#[tokio::test]
async fn missing_records_surface_as_not_found() {
    let (mut controller, _store) = loaded(&[("a", false)]).await;
    assert!(matches!(controller.toggle(TodoId(9)).await, Err(ClientError::NotFound(_))));
    assert!(matches!(controller.delete(TodoId(9)).await, Err(ClientError::NotFound(_))));
    assert!(matches!(controller.get(TodoId(9)).await, Err(ClientError::NotFound(_))));
}

#[tokio::test]
async fn edit_with_blank_description_clears_it() {
    let (mut controller, _store) = loaded(&[("a", false)]).await;
    controller
        .edit(
            TodoId(1),
            &UpdateTodoRequest {
                description: Some("notes".into()),
                ..UpdateTodoRequest::default()
            },
        )
        .await
        .expect("set description");
    controller
        .edit(
            TodoId(1),
            &UpdateTodoRequest {
                description: Some("  ".into()),
                ..UpdateTodoRequest::default()
            },
        )
        .await
        .expect("clear description");

    assert_eq!(controller.get(TodoId(1)).await.expect("get").description, None);
}

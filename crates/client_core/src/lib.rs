pub mod controller;
pub mod drag;
pub mod error;
pub mod reconciler;
pub mod remote;

pub use controller::TodoController;
pub use drag::{DragPhase, DragSession};
pub use error::{ClientError, DragError};
pub use reconciler::{
    apply_pending_order, compute_reorder, derive_view, merge_visible_order, sort_authoritative,
    ListReconciler, ReorderScope,
};
pub use remote::{HttpTodoStore, RemoteStore, StoreEvent, Subscription};

use shared::domain::{TodoId, TodoRecord};
use tracing::debug;

use crate::error::DragError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
}

/// Single drag gesture over a displayed list.
///
/// `Idle -> Dragging -> Idle`, leaving through either `release` (commit) or
/// `cancel`. Only one drag can be active at a time.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    active: Option<ActiveDrag>,
}

#[derive(Debug, Clone)]
struct ActiveDrag {
    item: TodoId,
    position: usize,
    sequence: Vec<TodoRecord>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DragPhase {
        if self.active.is_some() {
            DragPhase::Dragging
        } else {
            DragPhase::Idle
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn dragged_item(&self) -> Option<TodoId> {
        self.active.as_ref().map(|a| a.item)
    }

    /// The in-progress order while dragging.
    pub fn sequence(&self) -> Option<&[TodoRecord]> {
        self.active.as_ref().map(|a| a.sequence.as_slice())
    }

    /// Starts dragging `item` within `view`, the list as currently displayed.
    pub fn begin(&mut self, item: TodoId, view: &[TodoRecord]) -> Result<(), DragError> {
        if let Some(active) = &self.active {
            return Err(DragError::AlreadyDragging {
                active: active.item,
            });
        }
        let position = view
            .iter()
            .position(|r| r.id == item)
            .ok_or(DragError::UnknownItem(item))?;

        debug!(todo_id = item.0, position, "drag started");
        self.active = Some(ActiveDrag {
            item,
            position,
            sequence: view.to_vec(),
        });
        Ok(())
    }

    /// Moves the dragged item to `index`, clamped to the list bounds. Returns the
    /// index actually used.
    pub fn move_to(&mut self, index: usize) -> Result<usize, DragError> {
        let active = self.active.as_mut().ok_or(DragError::NotDragging)?;
        let target = index.min(active.sequence.len().saturating_sub(1));
        if target != active.position {
            let record = active.sequence.remove(active.position);
            active.sequence.insert(target, record);
            active.position = target;
        }
        Ok(target)
    }

    /// Ends the gesture and hands back the final sequence.
    pub fn release(&mut self) -> Result<Vec<TodoRecord>, DragError> {
        let active = self.active.take().ok_or(DragError::NotDragging)?;
        debug!(todo_id = active.item.0, position = active.position, "drag released");
        Ok(active.sequence)
    }

    pub fn cancel(&mut self) -> Result<(), DragError> {
        let active = self.active.take().ok_or(DragError::NotDragging)?;
        debug!(todo_id = active.item.0, "drag cancelled");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/drag_tests.rs"]
mod tests;

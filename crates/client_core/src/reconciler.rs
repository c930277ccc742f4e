//! Derives the displayed todo sequence from the authoritative snapshot and turns
//! user reorders into instructions for the store.
//!
//! Everything here is pure: inputs are borrowed, outputs are fresh vectors.

use std::collections::{HashMap, HashSet};

use shared::domain::{TodoFilter, TodoId, TodoRecord, ViewFilter};

/// Which ids a committed drag sends to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReorderScope {
    /// Only the ids the user could see. Hidden todos keep their stored order
    /// values and may interleave with the renumbered ones.
    #[default]
    VisibleOnly,
    /// The whole collection, with hidden todos pinned to their current slots.
    FullCollection,
}

/// The authoritative collection as last received from the store.
#[derive(Debug, Clone, Default)]
pub struct ListReconciler {
    records: Vec<TodoRecord>,
}

impl ListReconciler {
    pub fn new(records: Vec<TodoRecord>) -> Self {
        Self {
            records: sort_authoritative(records),
        }
    }

    pub fn replace(&mut self, records: Vec<TodoRecord>) {
        self.records = sort_authoritative(records);
    }

    pub fn records(&self) -> &[TodoRecord] {
        &self.records
    }

    pub fn get(&self, id: TodoId) -> Option<&TodoRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn view(&self, view_filter: &ViewFilter) -> Vec<TodoRecord> {
        derive_view(&self.records, view_filter.filter, &view_filter.search_query)
    }

    /// Ids to send for a reorder of `displayed` under the given scope.
    pub fn reorder_ids(&self, displayed: &[TodoRecord], scope: ReorderScope) -> Vec<TodoId> {
        let visible = compute_reorder(displayed);
        match scope {
            ReorderScope::VisibleOnly => visible,
            ReorderScope::FullCollection => merge_visible_order(&self.records, &visible),
        }
    }
}

/// Orders a snapshot by `order`, then creation time (oldest first), then id.
pub fn sort_authoritative(mut records: Vec<TodoRecord>) -> Vec<TodoRecord> {
    records.sort_by_key(|r| (r.order, r.created_at, r.id));
    records
}

/// Applies the completion filter, then the search query, keeping input order.
///
/// The query is trimmed; a blank query does not filter. Matching is a
/// case-insensitive substring test against the title or, when present, the
/// description.
pub fn derive_view(records: &[TodoRecord], filter: TodoFilter, search_query: &str) -> Vec<TodoRecord> {
    let query = search_query.trim().to_lowercase();

    records
        .iter()
        .filter(|record| filter.admits(record))
        .filter(|record| query.is_empty() || matches_query(record, &query))
        .cloned()
        .collect()
}

fn matches_query(record: &TodoRecord, lowered_query: &str) -> bool {
    record.title.to_lowercase().contains(lowered_query)
        || record
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(lowered_query))
}

/// Ids of the displayed sequence, in display order. The store assigns
/// `order = index` to each.
pub fn compute_reorder(displayed: &[TodoRecord]) -> Vec<TodoId> {
    displayed.iter().map(|r| r.id).collect()
}

/// Expands a reorder of a visible subset into an order for the whole collection.
///
/// Hidden todos stay in the slots they occupy in `full`. The slots held by
/// visible todos are refilled with `reordered_visible` in its new order. Ids in
/// `reordered_visible` that are not in `full` are dropped.
pub fn merge_visible_order(full: &[TodoRecord], reordered_visible: &[TodoId]) -> Vec<TodoId> {
    let present: HashSet<TodoId> = full.iter().map(|r| r.id).collect();
    let reordered: Vec<TodoId> = reordered_visible
        .iter()
        .copied()
        .filter(|id| present.contains(id))
        .collect();
    let visible: HashSet<TodoId> = reordered.iter().copied().collect();
    let mut refill = reordered.into_iter();

    full.iter()
        .map(|r| {
            if visible.contains(&r.id) {
                refill.next().unwrap_or(r.id)
            } else {
                r.id
            }
        })
        .collect()
}

/// Shows an optimistic reorder before the store confirms it.
///
/// Records named in `pending` are re-sequenced into pending order within the
/// slots they already occupy; the rest do not move.
pub fn apply_pending_order(view: Vec<TodoRecord>, pending: &[TodoId]) -> Vec<TodoRecord> {
    let rank: HashMap<TodoId, usize> = pending
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();

    let mut members: Vec<TodoRecord> = view
        .iter()
        .filter(|r| rank.contains_key(&r.id))
        .cloned()
        .collect();
    members.sort_by_key(|r| rank.get(&r.id).copied().unwrap_or(usize::MAX));
    let mut members = members.into_iter();

    view.into_iter()
        .map(|record| {
            if rank.contains_key(&record.id) {
                members.next().unwrap_or(record)
            } else {
                record
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;

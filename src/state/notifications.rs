use crate::constants::*;
use ember_notifications_util::{Notification, NotificationId};
use std::collections::VecDeque;

/// Where a removed id was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    WasVisible,
    WasPending,
    NotFound,
}

/// Manages the ordered collections of notification ids and history.
///
/// Visible ids are most-recent-first. Ids past the max-visible cap wait in
/// the pending queue and are promoted FIFO when a slot frees. Removed
/// notifications land in a history queue bounded by entry count and a
/// memory budget.
pub struct NotificationStore {
    /// Currently visible notification ids, newest first
    visible: Vec<NotificationId>,
    /// Ids waiting for a visible slot
    pending: VecDeque<NotificationId>,
    /// Removed notifications, newest first
    history: VecDeque<Notification>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self {
            visible: Vec::new(),
            pending: VecDeque::new(),
            history: VecDeque::new(),
        }
    }

    pub fn visible(&self) -> &[NotificationId] {
        &self.visible
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn history(&self) -> &VecDeque<Notification> {
        &self.history
    }

    /// Insert a new id at the head of the visible list, or queue it when the
    /// cap is reached. Returns true when the id became visible.
    pub fn insert(&mut self, id: NotificationId, max_visible: usize) -> bool {
        if self.visible.len() < max_visible {
            self.visible.insert(0, id);
            true
        } else {
            self.pending.push_back(id);
            false
        }
    }

    /// Remove an id from whichever queue holds it.
    pub fn remove(&mut self, id: &NotificationId) -> Removal {
        if let Some(pos) = self.visible.iter().position(|v| v == id) {
            self.visible.remove(pos);
            return Removal::WasVisible;
        }
        if let Some(pos) = self.pending.iter().position(|v| v == id) {
            self.pending.remove(pos);
            return Removal::WasPending;
        }
        Removal::NotFound
    }

    /// Promote the oldest pending id into a freed visible slot.
    ///
    /// Promoted ids join the tail of the visible list so the head keeps
    /// showing the newest notifications.
    pub fn promote(&mut self, max_visible: usize) -> Option<NotificationId> {
        if self.visible.len() >= max_visible {
            return None;
        }
        let id = self.pending.pop_front()?;
        self.visible.push(id.clone());
        Some(id)
    }

    /// Record a removed notification in history, newest first, applying the
    /// entry cap and memory budget.
    pub fn push_history(&mut self, notification: Notification) {
        self.history.push_front(notification);
        self.history.truncate(MAX_HISTORY_ENTRIES);
        self.apply_memory_budget(MAX_HISTORY_MEMORY);
    }

    /// Replace the history with previously persisted entries, newest first,
    /// re-applying the entry cap and memory budget.
    pub fn restore_history(&mut self, entries: Vec<Notification>) {
        self.history = entries.into_iter().take(MAX_HISTORY_ENTRIES).collect();
        self.apply_memory_budget(MAX_HISTORY_MEMORY);
    }

    /// Keep the newest history entries that fit within the budget.
    fn apply_memory_budget(&mut self, max_memory: usize) {
        let mut total_size: usize = 0;
        let mut keep_count: usize = 0;

        for n in &self.history {
            let size = n.estimated_size();
            if total_size + size > max_memory {
                break;
            }
            total_size += size;
            keep_count += 1;
        }

        self.history.truncate(keep_count);
    }

    pub fn history_memory_usage(&self) -> usize {
        self.history.iter().map(|n| n.estimated_size()).sum()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_notifications_util::{IdAllocator, Severity};
    use std::time::SystemTime;

    fn notification(id: NotificationId, message_len: usize) -> Notification {
        Notification {
            id,
            severity: Severity::Info,
            title: None,
            message: "m".repeat(message_len),
            actions: vec![],
            duration_ms: 0,
            created_at: SystemTime::now(),
            closable: true,
        }
    }

    #[test]
    fn test_cap_respected_and_overflow_queued() {
        let mut ids = IdAllocator::new();
        let mut store = NotificationStore::new();

        for _ in 0..8 {
            store.insert(ids.next(), 5);
        }

        assert_eq!(store.visible_count(), 5);
        assert_eq!(store.pending_count(), 3);
    }

    #[test]
    fn test_newest_first_ordering() {
        let mut ids = IdAllocator::new();
        let mut store = NotificationStore::new();

        let a = ids.next();
        let b = ids.next();
        store.insert(a.clone(), 5);
        store.insert(b.clone(), 5);

        assert_eq!(store.visible(), &[b, a]);
    }

    #[test]
    fn test_promotion_is_fifo() {
        let mut ids = IdAllocator::new();
        let mut store = NotificationStore::new();

        let first = ids.next();
        store.insert(first.clone(), 1);
        let second = ids.next();
        store.insert(second.clone(), 1);
        let third = ids.next();
        store.insert(third.clone(), 1);
        let _ = third;

        assert_eq!(store.remove(&first), Removal::WasVisible);
        assert_eq!(store.promote(1), Some(second));
        // No free slot yet
        assert_eq!(store.promote(1), None);
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn test_remove_from_pending() {
        let mut ids = IdAllocator::new();
        let mut store = NotificationStore::new();

        store.insert(ids.next(), 1);
        let queued = ids.next();
        store.insert(queued.clone(), 1);

        assert_eq!(store.remove(&queued), Removal::WasPending);
        assert_eq!(store.pending_count(), 0);

        assert_eq!(store.remove(&queued), Removal::NotFound);
    }

    #[test]
    fn test_history_memory_budget() {
        let mut ids = IdAllocator::new();
        let mut store = NotificationStore::new();

        // Each entry is ~64KB, budget is 256KB
        for _ in 0..8 {
            store.push_history(notification(ids.next(), 64 * 1024));
        }

        assert!(store.history().len() < 8);
        assert!(store.history_memory_usage() <= MAX_HISTORY_MEMORY);
        // Newest entry survives trimming
        assert_eq!(store.history().front().unwrap().id.as_str(), "ntf-8");
    }

    #[test]
    fn test_restore_history_reapplies_caps() {
        let mut ids = IdAllocator::new();
        let mut store = NotificationStore::new();

        let entries: Vec<Notification> = (0..(MAX_HISTORY_ENTRIES + 10))
            .map(|_| notification(ids.next(), 4))
            .collect();
        store.restore_history(entries);

        assert_eq!(store.history().len(), MAX_HISTORY_ENTRIES);
        // Restore keeps the persisted newest-first order from the front
        assert_eq!(store.history().front().unwrap().id.as_str(), "ntf-1");
    }

    #[test]
    fn test_history_entry_cap() {
        let mut ids = IdAllocator::new();
        let mut store = NotificationStore::new();

        for _ in 0..(MAX_HISTORY_ENTRIES + 20) {
            store.push_history(notification(ids.next(), 4));
        }

        assert_eq!(store.history().len(), MAX_HISTORY_ENTRIES);
    }
}

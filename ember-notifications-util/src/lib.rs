pub mod action;
pub mod severity;

pub use action::{ActionId, NotificationAction, limit_actions};
pub use severity::Severity;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::time::SystemTime;

/// Opaque unique identifier of a notification.
///
/// Unique for the lifetime of the allocating engine; comparable and hashable
/// but otherwise carries no meaning for callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Allocates process-unique notification ids.
///
/// Wraps around on overflow; collisions would need 2^64 - 1 notifications in
/// one process, so active-id tracking is not justified.
#[derive(Debug)]
pub struct IdAllocator {
    next: NonZeroU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: NonZeroU64::MIN,
        }
    }

    pub fn next(&mut self) -> NotificationId {
        let id = self.next;
        self.next = match self.next.checked_add(1) {
            Some(next) => next,
            None => {
                tracing::warn!("notification id counter overflowed, wrapping");
                NonZeroU64::MIN
            }
        };
        NotificationId(format!("ntf-{}", id.get()))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a notification left the screen.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloseReason {
    Expired = 1,
    Dismissed = 2,
    CloseRequested = 3,
    Undefined = 4,
}

/// A transient user-facing message, owned by the engine's store from
/// creation until the lifecycle completes removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub severity: Severity,
    pub title: Option<String>,
    pub message: String,
    pub actions: Vec<NotificationAction>,
    /// Milliseconds before auto-close; `0` means persistent.
    pub duration_ms: u64,
    pub created_at: SystemTime,
    /// Whether a manual close control is offered.
    pub closable: bool,
}

impl Notification {
    pub fn is_persistent(&self) -> bool {
        self.duration_ms == 0
    }

    pub fn age(&self) -> Option<std::time::Duration> {
        SystemTime::now().duration_since(self.created_at).ok()
    }

    /// Estimate memory usage of this notification in bytes.
    ///
    /// Used for the byte budget on the history queue.
    pub fn estimated_size(&self) -> usize {
        let mut size = 0;

        size += self.id.as_str().len();
        size += self.title.as_ref().map_or(0, String::len);
        size += self.message.len();

        for action in &self.actions {
            size += action.estimated_size();
        }

        // Struct overhead
        size += 128;

        size
    }
}

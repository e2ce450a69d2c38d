use ember_notifications_util::{ActionId, CloseReason, NotificationId};

/// Events dispatched by the engine, consumable by outside code such as
/// analytics or automated UI tests.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A notification entered the showing path (before any entry animation).
    NotificationShowing { id: NotificationId },
    /// A notification completed removal.
    NotificationClosed {
        id: NotificationId,
        reason: CloseReason,
    },
    /// An action was activated on a notification (tap maps to
    /// [`ActionId::Default`]).
    ActionInvoked {
        id: NotificationId,
        action: ActionId,
    },
    /// A persisted key changed, locally or in another context.
    StorageChanged {
        key: String,
        old: Option<serde_json::Value>,
        new: Option<serde_json::Value>,
    },
}

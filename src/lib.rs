//! Ephemeral notification engine.
//!
//! Headless core for toast-style notifications: a per-notification
//! lifecycle state machine with pausable countdowns, swipe/tap/long-press
//! gesture recognition, a virtualizing renderer behind a pluggable
//! [`Surface`], and settings/history persistence over a tiered storage
//! chain that degrades to in-memory without surfacing errors.
//!
//! Hosts construct a [`NotificationEngine`] from an [`EngineContext`],
//! call [`NotificationEngine::init`] once inside a tokio runtime, and then
//! drive it through the façade methods.

mod constants;

pub mod animation;
pub mod engine;
pub mod events;
pub mod gesture;
pub mod lifecycle;
pub mod render;
pub mod state;
pub mod storage;

pub use animation::{
    AnimationDriver, AnimationKind, CloseMotion, Easing, NoopDriver, TimedDriver,
};
pub use engine::{
    EngineContext, EngineStats, NotificationEngine, PerformanceMode, ShowOptions,
};
pub use events::EngineEvent;
pub use gesture::{HapticCue, Haptics, NoopHaptics, PointerEvent, SwipeDirection};
pub use lifecycle::LifecycleState;
pub use render::{HeadlessSurface, RenderError, RenderFrame, RenderItem, Surface};
pub use storage::{StorageError, StorageManager, StorageTier, TierKind};

pub use ember_notifications_config::{Anchor, Settings, SettingsPatch, SettingsSnapshot};
pub use ember_notifications_util::{
    ActionId, CloseReason, Notification, NotificationAction, NotificationId, Severity,
};

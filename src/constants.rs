// Constants module for ember-notifications
// Centralizes magic numbers for better maintainability

// ============================================================================
// Animation Constants
// ============================================================================

/// Frame tick interval for progress animation (roughly 60 FPS)
pub(crate) const FRAME_INTERVAL_MS: u64 = 16;

/// Duration of the card entry animation
pub(crate) const ENTRY_ANIMATION_MS: u64 = 200;

/// Duration of the card exit animation
pub(crate) const EXIT_ANIMATION_MS: u64 = 300;

/// Grace period added to the expected animation duration before the
/// fallback timeout forces the transition
pub(crate) const ANIMATION_FALLBACK_GRACE_MS: u64 = 100;

// ============================================================================
// UI Layout Constants
// ============================================================================

/// Width of notification cards in pixels
pub(crate) const NOTIFICATION_WIDTH: f32 = 380.0;

/// Maximum action buttons rendered per card; extras are dropped
pub(crate) const MAX_ACTIONS: usize = 3;

// ============================================================================
// Gesture Constants
// ============================================================================

/// Maximum press duration for a tap (milliseconds)
pub(crate) const TAP_MAX_MS: u64 = 250;

/// Maximum pointer displacement for a tap (pixels)
pub(crate) const TAP_MAX_DISPLACEMENT: f32 = 10.0;

/// Hold delay before a long-press fires (milliseconds)
pub(crate) const LONG_PRESS_MS: u64 = 500;

/// Movement tolerance that cancels a pending long-press (pixels)
pub(crate) const LONG_PRESS_TOLERANCE: f32 = 8.0;

/// Fraction of element width a drag must cross to commit a dismissal
pub(crate) const SWIPE_DISMISS_FRACTION: f32 = 0.35;

// ============================================================================
// Virtual Renderer Constants
// ============================================================================

/// Fixed per-item height used by the virtual list (pixels)
pub(crate) const ITEM_HEIGHT: f32 = 88.0;

/// Notification count above which virtualization kicks in
pub(crate) const VIRTUALIZATION_THRESHOLD: usize = 20;

/// Extra items rendered on each side of the viewport to avoid pop-in
pub(crate) const VIRTUAL_BUFFER_ITEMS: usize = 2;

/// Default viewport height when the surface reports none (pixels)
pub(crate) const DEFAULT_VIEWPORT_HEIGHT: f32 = 600.0;

// ============================================================================
// Storage Constants
// ============================================================================

/// Retries per operation on a tier before falling back to the next one
pub(crate) const STORAGE_RETRY_BUDGET: u32 = 2;

/// Interval between replication-queue flushes (milliseconds)
pub(crate) const SYNC_FLUSH_INTERVAL_MS: u64 = 1_000;

/// Version stamped into every stored envelope
pub(crate) const STORAGE_SCHEMA_VERSION: u32 = 1;

/// Persisted key for the settings record
pub(crate) const SETTINGS_KEY: &str = "settings";

/// Persisted key for the bounded history record
pub(crate) const HISTORY_KEY: &str = "history";

// ============================================================================
// History and Cleanup Constants
// ============================================================================

/// Maximum entries retained in the history queue
pub(crate) const MAX_HISTORY_ENTRIES: usize = 100;

/// Memory budget for the history queue (bytes)
pub(crate) const MAX_HISTORY_MEMORY: usize = 256 * 1024;

/// Age at which the auto-cleanup sweep evicts a notification
pub(crate) const CLEANUP_RETENTION_MS: u64 = 24 * 60 * 60 * 1000;

// ============================================================================
// Rate Limiting Constants
// ============================================================================

/// Maximum notifications per minute per source
pub(crate) const RATE_LIMIT_PER_MINUTE: u32 = 60;

/// Maximum number of sources tracked by the rate limiter
pub(crate) const RATE_LIMIT_MAX_SOURCES: usize = 1000;

/// Rate limiter cleanup cadence (in notification count)
pub(crate) const RATE_LIMIT_CLEANUP_INTERVAL: u64 = 100;

// ============================================================================
// Channel and Mode Constants
// ============================================================================

/// Capacity of the engine event broadcast channel
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Effective max-visible cap while in reduced performance mode
pub(crate) const REDUCED_MODE_MAX_VISIBLE: usize = 3;

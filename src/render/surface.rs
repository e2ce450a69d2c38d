use ember_notifications_config::Anchor;
use ember_notifications_util::{NotificationId, Severity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("surface is not mounted")]
    NotMounted,
    #[error("element construction failed: {0}")]
    Construction(String),
}

/// Accessible live-region role attached to a rendered card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveRegionRole {
    /// Polite announcement (success, info)
    Status,
    /// Assertive announcement (warning, error)
    Alert,
}

impl From<Severity> for LiveRegionRole {
    fn from(severity: Severity) -> Self {
        if severity.is_assertive() {
            LiveRegionRole::Alert
        } else {
            LiveRegionRole::Status
        }
    }
}

/// One rendered notification element.
///
/// This is the stable rendered-surface contract: a unique identifying
/// attribute, a type-specific style class, a live-region role, a close
/// control when closable, and a progress indicator whenever the
/// notification is timed.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    pub id: NotificationId,
    pub severity: Severity,
    /// Type-specific styling class, e.g. `toast-error`
    pub style_class: String,
    pub role: LiveRegionRole,
    pub title: Option<String>,
    pub message: String,
    pub action_labels: Vec<String>,
    pub closable: bool,
    /// Remaining-proportion of the countdown, present only when timed
    pub progress: Option<f32>,
    /// Horizontal offset while a drag is in progress
    pub offset_x: f32,
}

impl RenderItem {
    /// Minimal fallback element carrying only the message and a close
    /// control, used when building the full card fails.
    pub fn fallback(id: NotificationId, severity: Severity, message: String) -> Self {
        Self {
            style_class: format!("toast-{}", severity.as_str()),
            role: severity.into(),
            id,
            severity,
            title: None,
            message,
            action_labels: Vec::new(),
            closable: true,
            progress: None,
            offset_x: 0.0,
        }
    }
}

/// One frame handed to the surface: the visible slice, its vertical offset
/// transform, and the total virtual height behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub items: Vec<RenderItem>,
    pub offset_y: f32,
    pub total_height: f32,
    pub anchor: Anchor,
}

/// The rendering seam.
///
/// The engine never touches a concrete windowing or DOM global; everything
/// it needs from the host is behind this trait, which keeps it portable to
/// test harnesses and non-browser hosts.
pub trait Surface: Send {
    fn mount(&mut self) -> Result<(), RenderError>;
    fn unmount(&mut self);
    fn viewport_height(&self) -> f32;
    fn prefers_reduced_motion(&self) -> bool {
        false
    }
    fn render(&mut self, frame: RenderFrame) -> Result<(), RenderError>;
}

/// In-memory surface recording every frame. Cloning yields a probe sharing
/// the same frame log, which is how tests inspect what was rendered.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    mounted: Arc<AtomicBool>,
    viewport_height: f32,
    reduced_motion: bool,
    frames: Arc<Mutex<Vec<RenderFrame>>>,
}

impl HeadlessSurface {
    pub fn new(viewport_height: f32) -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(false)),
            viewport_height,
            reduced_motion: false,
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_reduced_motion(mut self, reduced: bool) -> Self {
        self.reduced_motion = reduced;
        self
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn frame_count(&self) -> usize {
        self.frames().len()
    }

    pub fn last_frame(&self) -> Option<RenderFrame> {
        self.frames().last().cloned()
    }

    fn frames(&self) -> std::sync::MutexGuard<'_, Vec<RenderFrame>> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(600.0)
    }
}

impl Surface for HeadlessSurface {
    fn mount(&mut self) -> Result<(), RenderError> {
        self.mounted.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unmount(&mut self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    fn prefers_reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    fn render(&mut self, frame: RenderFrame) -> Result<(), RenderError> {
        if !self.is_mounted() {
            return Err(RenderError::NotMounted);
        }
        self.frames().push(frame);
        Ok(())
    }
}

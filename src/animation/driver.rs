use async_trait::async_trait;
use std::time::Duration;

use crate::gesture::SwipeDirection;

/// Exit motion for a closing card, kept consistent with how the close was
/// triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseMotion {
    #[default]
    Fade,
    SlideLeft,
    SlideRight,
}

impl From<SwipeDirection> for CloseMotion {
    fn from(direction: SwipeDirection) -> Self {
        match direction {
            SwipeDirection::Left => CloseMotion::SlideLeft,
            SwipeDirection::Right => CloseMotion::SlideRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    Entry,
    Exit(CloseMotion),
    /// A below-threshold swipe settling back to rest
    Rebound,
}

/// Reports animation completion as a future instead of matching on
/// platform animation-end events. The engine races every `play` against a
/// fallback timeout, so a driver that never resolves cannot leak a card.
#[async_trait]
pub trait AnimationDriver: Send + Sync {
    async fn play(&self, kind: AnimationKind, duration: Duration);
}

/// Driver that models an animation as a plain delay. The default.
#[derive(Debug, Default)]
pub struct TimedDriver;

#[async_trait]
impl AnimationDriver for TimedDriver {
    async fn play(&self, _kind: AnimationKind, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Driver that completes immediately; used when animations are disabled and
/// in tests that do not care about entry/exit timing.
#[derive(Debug, Default)]
pub struct NoopDriver;

#[async_trait]
impl AnimationDriver for NoopDriver {
    async fn play(&self, _kind: AnimationKind, _duration: Duration) {}
}

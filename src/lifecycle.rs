use ember_notifications_util::CloseReason;
use std::time::Duration;
use tokio::time::Instant;

/// Lifecycle states of a single notification.
///
/// `created → entering → visible ⇄ paused → exiting → removed`, with
/// `entering` skipped when animations are off or the surface reports a
/// reduced-motion preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Entering,
    Visible,
    Paused,
    Exiting,
    Removed,
}

/// Per-notification state machine with elapsed accounting.
///
/// The machine itself owns no timers; the engine schedules them from the
/// remaining durations this type reports, which keeps the transitions
/// testable without a runtime.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
    /// None for persistent notifications (`duration = 0`)
    duration: Option<Duration>,
    /// When the current visible stretch began
    shown_at: Option<Instant>,
    /// Time spent visible before the most recent pause
    elapsed_before_pause: Duration,
    close_reason: Option<CloseReason>,
    removal_fired: bool,
}

impl Lifecycle {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            state: LifecycleState::Created,
            duration: (duration_ms > 0).then(|| Duration::from_millis(duration_ms)),
            shown_at: None,
            elapsed_before_pause: Duration::ZERO,
            close_reason: None,
            removal_fired: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_persistent(&self) -> bool {
        self.duration.is_none()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    /// Whether the notification still occupies a visible slot.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, LifecycleState::Exiting | LifecycleState::Removed)
    }

    /// Leave `created`. Returns true when an entry animation should play;
    /// false means the machine jumped straight to `visible`.
    pub fn begin_entry(&mut self, animate: bool, now: Instant) -> bool {
        debug_assert_eq!(self.state, LifecycleState::Created);
        if animate {
            self.state = LifecycleState::Entering;
            true
        } else {
            self.state = LifecycleState::Visible;
            self.shown_at = Some(now);
            false
        }
    }

    /// Entry animation finished; start counting visible time.
    pub fn mark_visible(&mut self, now: Instant) {
        if matches!(self.state, LifecycleState::Created | LifecycleState::Entering) {
            self.state = LifecycleState::Visible;
            self.shown_at = Some(now);
        }
    }

    /// `visible → paused`; banks elapsed time so a later resume continues
    /// from where the countdown stopped.
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.state != LifecycleState::Visible {
            return false;
        }
        if let Some(shown_at) = self.shown_at.take() {
            self.elapsed_before_pause += now.saturating_duration_since(shown_at);
        }
        self.state = LifecycleState::Paused;
        true
    }

    /// `paused → visible`; returns the remaining duration a new auto-close
    /// timer should be scheduled for (None when persistent).
    pub fn resume(&mut self, now: Instant) -> Option<Duration> {
        if self.state != LifecycleState::Paused {
            return None;
        }
        self.state = LifecycleState::Visible;
        self.shown_at = Some(now);
        self.remaining(now)
    }

    /// Remaining time before auto-close, accounting for pauses.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let duration = self.duration?;
        let mut elapsed = self.elapsed_before_pause;
        if self.state == LifecycleState::Visible {
            if let Some(shown_at) = self.shown_at {
                elapsed += now.saturating_duration_since(shown_at);
            }
        }
        Some(duration.saturating_sub(elapsed))
    }

    /// `visible|paused → exiting`. Returns true only for the transition that
    /// wins; a racing second close request is a no-op.
    pub fn begin_exit(&mut self, reason: CloseReason) -> bool {
        if matches!(self.state, LifecycleState::Exiting | LifecycleState::Removed) {
            return false;
        }
        self.state = LifecycleState::Exiting;
        self.close_reason = Some(reason);
        true
    }

    /// Terminal transition. Returns true exactly once so the removal
    /// callback cannot double-fire when the exit animation and its fallback
    /// timeout race.
    pub fn mark_removed(&mut self) -> bool {
        self.state = LifecycleState::Removed;
        if self.removal_fired {
            return false;
        }
        self.removal_fired = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_entry_with_animation() {
        let mut lc = Lifecycle::new(4000);
        assert_eq!(lc.state(), LifecycleState::Created);
        assert!(lc.begin_entry(true, now()));
        assert_eq!(lc.state(), LifecycleState::Entering);
        lc.mark_visible(now());
        assert_eq!(lc.state(), LifecycleState::Visible);
    }

    #[test]
    fn test_entry_skips_to_visible_without_animation() {
        let mut lc = Lifecycle::new(4000);
        assert!(!lc.begin_entry(false, now()));
        assert_eq!(lc.state(), LifecycleState::Visible);
    }

    #[test]
    fn test_pause_resume_preserves_remaining() {
        let start = now();
        let mut lc = Lifecycle::new(4000);
        lc.begin_entry(false, start);

        // One second elapses, then a pause of arbitrary length
        let paused_at = start + Duration::from_millis(1000);
        assert!(lc.pause(paused_at));
        assert_eq!(lc.state(), LifecycleState::Paused);

        let resumed_at = paused_at + Duration::from_secs(600);
        let remaining = lc.resume(resumed_at).unwrap();
        assert_eq!(remaining, Duration::from_millis(3000));
    }

    #[test]
    fn test_repeated_pause_resume_accumulates() {
        let start = now();
        let mut lc = Lifecycle::new(4000);
        lc.begin_entry(false, start);

        let t1 = start + Duration::from_millis(500);
        lc.pause(t1);
        let t2 = t1 + Duration::from_millis(50);
        lc.resume(t2);
        let t3 = t2 + Duration::from_millis(500);
        lc.pause(t3);
        let t4 = t3 + Duration::from_millis(50);
        let remaining = lc.resume(t4).unwrap();

        assert_eq!(remaining, Duration::from_millis(3000));
    }

    #[test]
    fn test_persistent_has_no_remaining() {
        let mut lc = Lifecycle::new(0);
        lc.begin_entry(false, now());
        assert!(lc.is_persistent());
        assert_eq!(lc.remaining(now()), None);
        assert_eq!(lc.resume(now()), None);
    }

    #[test]
    fn test_pause_only_from_visible() {
        let mut lc = Lifecycle::new(4000);
        assert!(!lc.pause(now()));
        lc.begin_entry(true, now());
        // Entering is not pausable
        assert!(!lc.pause(now()));
    }

    #[test]
    fn test_close_races_resolve_to_first_reason() {
        let mut lc = Lifecycle::new(4000);
        lc.begin_entry(false, now());

        assert!(lc.begin_exit(CloseReason::Dismissed));
        // Timer expiry arriving late loses the race
        assert!(!lc.begin_exit(CloseReason::Expired));
        assert_eq!(lc.close_reason(), Some(CloseReason::Dismissed));
    }

    #[test]
    fn test_removal_fires_exactly_once() {
        let mut lc = Lifecycle::new(4000);
        lc.begin_entry(false, now());
        lc.begin_exit(CloseReason::Expired);

        assert!(lc.mark_removed());
        // Fallback timeout firing after the animation completion
        assert!(!lc.mark_removed());
        assert_eq!(lc.state(), LifecycleState::Removed);
    }

    #[test]
    fn test_exit_allowed_before_visible() {
        // A notification that fails during entry must still reach removed
        let mut lc = Lifecycle::new(4000);
        lc.begin_entry(true, now());
        assert!(lc.begin_exit(CloseReason::Undefined));
        assert!(lc.mark_removed());
    }
}

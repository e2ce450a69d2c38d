use crate::constants::*;

/// Pointer input fed to the recognizer by the host surface.
///
/// Timestamps are milliseconds on any monotonic clock; only differences are
/// used. `on_control` marks presses that began on an interactive child
/// (action button or close control) so tap handling can be suppressed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32, t_ms: u64, on_control: bool },
    Move { x: f32, y: f32, t_ms: u64 },
    Up { x: f32, y: f32, t_ms: u64 },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Left,
    Right,
}

/// Points at which tactile feedback is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticCue {
    GestureStart,
    ThresholdReached,
    Dismissed,
}

/// Tactile feedback capability. Hosts without a vibration device use
/// [`NoopHaptics`]; absence of the capability is never an error.
pub trait Haptics: Send + Sync {
    fn vibrate(&self, cue: HapticCue);
}

#[derive(Debug, Default)]
pub struct NoopHaptics;

impl Haptics for NoopHaptics {
    fn vibrate(&self, _cue: HapticCue) {}
}

/// What the recognizer asks its owner to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutput {
    /// A gesture is in progress; suspend the auto-close timer.
    PauseTimer,
    /// Gesture ended without dismissal; resume the auto-close timer.
    ResumeTimer,
    /// Tap on the card body.
    Tap,
    /// Pointer held still past the long-press delay.
    LongPress,
    /// Visually offset the card by this many pixels while dragging.
    DragTo(f32),
    /// Drag displacement crossed the dismiss threshold.
    ThresholdReached,
    /// Commit the dismissal in the drag direction.
    Dismiss(SwipeDirection),
    /// Below-threshold release; animate back to rest.
    Rebound,
    Haptic(HapticCue),
}

#[derive(Debug)]
enum Phase {
    Idle,
    Tracking {
        origin_x: f32,
        origin_y: f32,
        started_ms: u64,
        on_control: bool,
        last_dx: f32,
        /// Displacement ever exceeded the tap budget
        moved_beyond_tap: bool,
        /// Displacement ever exceeded the long-press tolerance
        long_press_cancelled: bool,
        long_press_fired: bool,
        over_threshold: bool,
    },
}

/// Recognizes tap, swipe-to-dismiss, and long-press on one notification
/// surface.
///
/// Purely event-driven: the owner feeds [`PointerEvent`]s and calls
/// [`long_press_due`](Self::long_press_due) when the long-press deadline it
/// scheduled for the current press fires.
#[derive(Debug)]
pub struct GestureRecognizer {
    /// Element width, for the proportional dismiss threshold
    width: f32,
    phase: Phase,
    /// Incremented per press so stale long-press deadlines are ignored
    press_seq: u64,
}

impl GestureRecognizer {
    pub fn new(width: f32) -> Self {
        Self {
            width: width.max(1.0),
            phase: Phase::Idle,
            press_seq: 0,
        }
    }

    /// Token identifying the current press; schedule the long-press
    /// deadline with it and pass it back to [`long_press_due`](Self::long_press_due).
    pub fn press_token(&self) -> u64 {
        self.press_seq
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.phase, Phase::Tracking { .. })
    }

    fn commit_px(&self) -> f32 {
        self.width * SWIPE_DISMISS_FRACTION
    }

    pub fn handle(&mut self, event: PointerEvent) -> Vec<GestureOutput> {
        match event {
            PointerEvent::Down { x, y, t_ms, on_control } => {
                self.press_seq = self.press_seq.wrapping_add(1);
                self.phase = Phase::Tracking {
                    origin_x: x,
                    origin_y: y,
                    started_ms: t_ms,
                    on_control,
                    last_dx: 0.0,
                    moved_beyond_tap: false,
                    long_press_cancelled: false,
                    long_press_fired: false,
                    over_threshold: false,
                };
                vec![
                    GestureOutput::PauseTimer,
                    GestureOutput::Haptic(HapticCue::GestureStart),
                ]
            }
            PointerEvent::Move { x, y, .. } => self.on_move(x, y),
            PointerEvent::Up { x, y, t_ms } => self.on_up(x, y, t_ms),
            PointerEvent::Cancel => {
                let was_tracking = self.is_tracking();
                self.phase = Phase::Idle;
                if was_tracking {
                    vec![GestureOutput::Rebound, GestureOutput::ResumeTimer]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn on_move(&mut self, x: f32, y: f32) -> Vec<GestureOutput> {
        let commit_px = self.commit_px();
        let Phase::Tracking {
            origin_x,
            origin_y,
            last_dx,
            moved_beyond_tap,
            long_press_cancelled,
            over_threshold,
            ..
        } = &mut self.phase
        else {
            return Vec::new();
        };

        let dx = x - *origin_x;
        let dy = y - *origin_y;
        let displacement = (dx * dx + dy * dy).sqrt();

        if displacement > TAP_MAX_DISPLACEMENT {
            *moved_beyond_tap = true;
        }
        if displacement > LONG_PRESS_TOLERANCE {
            *long_press_cancelled = true;
        }
        *last_dx = dx;

        let mut outputs = vec![GestureOutput::DragTo(dx)];
        let crossing = dx.abs() >= commit_px;
        if crossing && !*over_threshold {
            outputs.push(GestureOutput::ThresholdReached);
            outputs.push(GestureOutput::Haptic(HapticCue::ThresholdReached));
        }
        *over_threshold = crossing;
        outputs
    }

    fn on_up(&mut self, x: f32, _y: f32, t_ms: u64) -> Vec<GestureOutput> {
        let commit_px = self.commit_px();
        let Phase::Tracking {
            origin_x,
            started_ms,
            on_control,
            last_dx,
            moved_beyond_tap,
            long_press_fired,
            ..
        } = self.phase
        else {
            return Vec::new();
        };
        self.phase = Phase::Idle;

        let dx = x - origin_x;

        if dx.abs() >= commit_px {
            let direction = if dx < 0.0 {
                SwipeDirection::Left
            } else {
                SwipeDirection::Right
            };
            return vec![
                GestureOutput::Dismiss(direction),
                GestureOutput::Haptic(HapticCue::Dismissed),
            ];
        }

        let mut outputs = Vec::new();
        if moved_beyond_tap {
            outputs.push(GestureOutput::Rebound);
        } else {
            // Jitter inside the tap budget still settles the card back
            if last_dx != 0.0 {
                outputs.push(GestureOutput::Rebound);
            }
            if !long_press_fired
                && t_ms.saturating_sub(started_ms) <= TAP_MAX_MS
                && !on_control
            {
                outputs.push(GestureOutput::Tap);
            }
        }
        outputs.push(GestureOutput::ResumeTimer);
        outputs
    }

    /// The long-press deadline for `token` elapsed. Fires at most once per
    /// press, and only while the pointer has stayed within tolerance.
    pub fn long_press_due(&mut self, token: u64) -> Vec<GestureOutput> {
        let Phase::Tracking {
            long_press_cancelled,
            long_press_fired,
            over_threshold,
            ..
        } = &mut self.phase
        else {
            return Vec::new();
        };
        if token != self.press_seq
            || *long_press_cancelled
            || *long_press_fired
            || *over_threshold
        {
            return Vec::new();
        }
        *long_press_fired = true;
        vec![GestureOutput::LongPress]
    }
}

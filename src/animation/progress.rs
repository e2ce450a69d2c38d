use super::easing::Easing;
use std::time::Duration;
use tokio::time::Instant;

/// Drives the countdown indicator of a timed notification.
///
/// Tracks elapsed time against the configured duration, subtracting time
/// spent paused so the indicator does not jump across a pause/resume cycle.
/// The engine samples it from a frame-interval tick; the animator itself
/// schedules nothing, so stopping the tick leaves no dangling callback.
#[derive(Debug)]
pub struct ProgressAnimator {
    duration: Duration,
    easing: Easing,
    started: Instant,
    paused_at: Option<Instant>,
    total_paused: Duration,
}

impl ProgressAnimator {
    pub fn new(duration: Duration, easing: Easing, now: Instant) -> Self {
        Self {
            duration,
            easing,
            started: now,
            paused_at: None,
            total_paused: Duration::ZERO,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Record the pause start; sampling while paused reports the value at
    /// the moment of pausing.
    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Accumulate the paused stretch so elapsed time continues seamlessly.
    pub fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.total_paused += now.saturating_duration_since(paused_at);
        }
    }

    /// Raw elapsed fraction in `[0, 1]`, before easing.
    pub fn elapsed_fraction(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let sample_at = self.paused_at.unwrap_or(now);
        let elapsed = sample_at
            .saturating_duration_since(self.started)
            .saturating_sub(self.total_paused);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// The value drawn by the indicator: the eased complement of elapsed
    /// time, counting down from 1 to 0.
    pub fn remaining_fraction(&self, now: Instant) -> f32 {
        1.0 - self.easing.apply(self.elapsed_fraction(now))
    }

    /// Completion signal: the countdown has fully elapsed.
    pub fn is_complete(&self, now: Instant) -> bool {
        self.paused_at.is_none() && self.elapsed_fraction(now) >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animator(duration_ms: u64) -> (ProgressAnimator, Instant) {
        let start = Instant::now();
        (
            ProgressAnimator::new(Duration::from_millis(duration_ms), Easing::Linear, start),
            start,
        )
    }

    #[test]
    fn test_linear_countdown() {
        let (anim, start) = animator(1000);
        assert!((anim.remaining_fraction(start) - 1.0).abs() < 1e-4);

        let half = start + Duration::from_millis(500);
        assert!((anim.remaining_fraction(half) - 0.5).abs() < 1e-3);

        let done = start + Duration::from_millis(1000);
        assert!(anim.remaining_fraction(done).abs() < 1e-4);
        assert!(anim.is_complete(done));
    }

    #[test]
    fn test_pause_freezes_value() {
        let (mut anim, start) = animator(1000);
        let quarter = start + Duration::from_millis(250);
        anim.pause(quarter);

        let much_later = start + Duration::from_secs(60);
        assert!((anim.remaining_fraction(much_later) - 0.75).abs() < 1e-3);
        assert!(!anim.is_complete(much_later));
    }

    #[test]
    fn test_resume_does_not_jump() {
        let (mut anim, start) = animator(1000);
        let t_pause = start + Duration::from_millis(400);
        anim.pause(t_pause);
        let t_resume = t_pause + Duration::from_secs(30);
        anim.resume(t_resume);

        // Immediately after resume, the value matches the pre-pause value
        assert!((anim.remaining_fraction(t_resume) - 0.6).abs() < 1e-3);

        // And continues from there
        let t_later = t_resume + Duration::from_millis(600);
        assert!(anim.is_complete(t_later));
    }

    #[test]
    fn test_double_pause_is_idempotent() {
        let (mut anim, start) = animator(1000);
        let t1 = start + Duration::from_millis(100);
        anim.pause(t1);
        anim.pause(t1 + Duration::from_millis(500));
        anim.resume(t1 + Duration::from_millis(900));

        assert!((anim.remaining_fraction(t1 + Duration::from_millis(900)) - 0.9).abs() < 1e-3);
    }

    #[test]
    fn test_zero_duration_is_immediately_complete() {
        let start = Instant::now();
        let anim = ProgressAnimator::new(Duration::ZERO, Easing::Linear, start);
        assert!(anim.is_complete(start));
        assert!(anim.remaining_fraction(start).abs() < 1e-6);
    }

    #[test]
    fn test_eased_countdown_stays_in_range() {
        let start = Instant::now();
        let anim =
            ProgressAnimator::new(Duration::from_millis(1000), Easing::EaseInOut, start);
        for step in 0..=20 {
            let t = start + Duration::from_millis(step * 50);
            let value = anim.remaining_fraction(t);
            assert!((0.0..=1.0).contains(&value));
        }
    }
}

pub mod driver;
pub mod easing;
pub mod progress;

pub use driver::{AnimationDriver, AnimationKind, CloseMotion, NoopDriver, TimedDriver};
pub use easing::Easing;
pub use progress::ProgressAnimator;

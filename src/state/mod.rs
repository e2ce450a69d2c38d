pub mod notifications;

pub use notifications::{NotificationStore, Removal};

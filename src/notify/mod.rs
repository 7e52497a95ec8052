//! Single-slot notification channel for transient user-facing messages

mod channel;

pub use channel::{Notification, NotificationChannel, Severity};

//! Services module

pub mod check;
pub mod quota;
pub mod relative_time;

pub use check::{
    check_limits, format_limits_message, LogNotifier, Notification, NotificationLevel, Notifier,
};
pub use relative_time::{format_relative, format_relative_now};

//! Data model definitions

pub mod notification;

pub use notification::{Notification, NotificationInput, NotificationType};

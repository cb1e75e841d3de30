//! Operator notifications.

mod telegram;
mod traits;
mod types;

pub use telegram::{split_message, TelegramNotifier, MAX_MESSAGE_LEN};
pub use traits::{NoopNotifier, NotificationSink};
pub use types::Notification;

use super::Notification;

/// Best-effort operator notifications.
///
/// `notify` must return promptly and never fail; delivery problems are logged
/// by the implementation.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink used when no transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl NotificationSink for NoopNotifier {
    fn notify(&self, notification: Notification) {
        tracing::trace!(?notification, "Notification dropped (no notifier configured)");
    }
}

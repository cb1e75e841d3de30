//! Mock notification sink for testing.

use std::sync::{Arc, Mutex};

use crate::notify::{Notification, NotificationSink};

/// Records every notification it receives.
#[derive(Debug, Default, Clone)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_for(&self, task_id: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.task_id() == Some(task_id))
            .collect()
    }
}

impl NotificationSink for MockNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

//! Transient operator notifications.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Number of notifications kept for late subscribers.
pub const NOTIFICATION_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Bounded history plus live broadcast.
pub struct Notifier {
    history: Mutex<VecDeque<Notification>>,
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTIFICATION_HISTORY);
        Self {
            history: Mutex::new(VecDeque::with_capacity(NOTIFICATION_HISTORY)),
            tx,
        }
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            level,
            message: message.into(),
            at: Utc::now(),
        };
        match level {
            NotificationLevel::Error => warn!(message = %notification.message, "Notification"),
            _ => info!(message = %notification.message, "Notification"),
        }

        {
            let mut history = self.history.lock();
            if history.len() == NOTIFICATION_HISTORY {
                history.pop_front();
            }
            history.push_back(notification.clone());
        }
        // No receivers is fine
        let _ = self.tx.send(notification);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message);
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.history.lock().back().cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let notifier = Notifier::new();
        for i in 0..(NOTIFICATION_HISTORY + 5) {
            notifier.info(format!("n{i}"));
        }
        let recent = notifier.recent();
        assert_eq!(recent.len(), NOTIFICATION_HISTORY);
        assert_eq!(recent[0].message, "n5");
        assert_eq!(notifier.latest().unwrap().message, "n54");
    }

    #[tokio::test]
    async fn test_subscribers_receive_live_notifications() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        notifier.error("order rejected");
        let n = rx.recv().await.unwrap();
        assert_eq!(n.level, NotificationLevel::Error);
        assert_eq!(n.message, "order rejected");
    }
}

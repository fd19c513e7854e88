use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of asking the platform for notification permission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
}

/// Boundary for user-visible reminder delivery. Every method is best-effort:
/// implementations swallow and log their own failures.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    /// Short name used for logging.
    fn name(&self) -> &'static str;

    async fn request_permission(&self) -> Permission;

    /// System notification.
    async fn notify(&self, title: &str, body: &str);

    async fn play_sound(&self, clip: &str);

    /// Transient in-app message, used when notifications are unavailable.
    async fn show_message(&self, title: &str, body: &str);
}

/// One call observed by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Notification { title: String, body: String },
    Sound { clip: String },
    Message { title: String, body: String },
}

/// Dispatcher that records every call and is useful for tests and offline smoke
/// checks.
#[derive(Debug, Clone)]
pub struct RecordingDispatcher {
    permission: Permission,
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingDispatcher {
    pub fn new(permission: Permission) -> Self {
        Self {
            permission,
            alerts: Arc::default(),
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> usize {
        self.alerts()
            .iter()
            .filter(|alert| matches!(alert, Alert::Notification { .. }))
            .count()
    }

    fn record(&self, alert: Alert) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push(alert);
        }
    }
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self::new(Permission::Granted)
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn request_permission(&self) -> Permission {
        self.permission
    }

    async fn notify(&self, title: &str, body: &str) {
        self.record(Alert::Notification {
            title: title.to_string(),
            body: body.to_string(),
        });
    }

    async fn play_sound(&self, clip: &str) {
        self.record(Alert::Sound {
            clip: clip.to_string(),
        });
    }

    async fn show_message(&self, title: &str, body: &str) {
        self.record(Alert::Message {
            title: title.to_string(),
            body: body.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_dispatcher_keeps_call_order() {
        let dispatcher = RecordingDispatcher::new(Permission::Denied);
        assert_eq!(dispatcher.request_permission().await, Permission::Denied);

        dispatcher.notify("Task Reminder", "It's time for: Run").await;
        dispatcher.play_sound("chime").await;
        dispatcher.show_message("Task Reminder", "It's time for: Run").await;

        assert_eq!(dispatcher.notifications(), 1);
        assert_eq!(
            dispatcher.alerts()[1],
            Alert::Sound {
                clip: "chime".into()
            }
        );
        assert_eq!(dispatcher.alerts().len(), 3);
    }
}

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

/// An action offered alongside a notification, such as "Sync now".
pub struct FollowUp {
    label: String,
    action: Box<dyn FnOnce() + Send>,
}

impl FollowUp {
    pub fn new(label: impl Into<String>, action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.into(),
            action: Box::new(action),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(self) {
        (self.action)()
    }
}

impl fmt::Debug for FollowUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FollowUp")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// User-facing notification channel. Called at most once per completed
/// operation, possibly from a background thread.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, title: &str, message: &str, follow_up: Option<FollowUp>);

    fn notify_error(&self, title: &str, message: &str, follow_up: Option<FollowUp>);
}

/// Writes notifications to the log. Follow-up actions are not offered.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, title: &str, message: &str, follow_up: Option<FollowUp>) {
        info!(title, "{message}");
        if let Some(follow_up) = follow_up {
            debug!(label = follow_up.label(), "Dropping follow-up action");
        }
    }

    fn notify_error(&self, title: &str, message: &str, follow_up: Option<FollowUp>) {
        error!(title, "{message}");
        if let Some(follow_up) = follow_up {
            debug!(label = follow_up.label(), "Dropping follow-up action");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    pub follow_up: Option<FollowUp>,
}

/// Keeps every notification for later inspection. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn levels(&self) -> Vec<NotificationLevel> {
        self.lock().iter().map(|n| n.level).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|n| n.message.clone()).collect()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.lock())
    }

    fn record(&self, level: NotificationLevel, title: &str, message: &str, follow_up: Option<FollowUp>) {
        self.lock().push(Notification {
            level,
            title: title.to_string(),
            message: message.to_string(),
            follow_up,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        // Poisoning is ignored; records made before a panic stay readable.
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for RecordingNotifier {
    fn notify_success(&self, title: &str, message: &str, follow_up: Option<FollowUp>) {
        self.record(NotificationLevel::Success, title, message, follow_up);
    }

    fn notify_error(&self, title: &str, message: &str, follow_up: Option<FollowUp>) {
        self.record(NotificationLevel::Error, title, message, follow_up);
    }
}

//! Seams towards the presentation layer: the toast/notification surface and
//! the blocking absence-confirmation dialog.

use async_trait::async_trait;
use log::{error, info, warn};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Non-blocking notification surface (toasts)
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log. Used when no UI is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Info | NotificationLevel::Success => {
                info!("[notify] {}", notification.message)
            }
            NotificationLevel::Warning => warn!("[notify] {}", notification.message),
            NotificationLevel::Error => error!("[notify] {}", notification.message),
        }
    }
}

/// Keeps every notification in memory, in order
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut notifications) = self.notifications.lock() {
            notifications.push(notification);
        }
    }
}

/// Operator's answer when a commit would record absences without a reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceDecision {
    /// Commit anyway with the default reason
    Proceed,
    /// Go to the full attendance screen; keep every pending change
    Redirect,
    /// Do nothing; keep every pending change
    Cancel,
}

/// Blocking three-way confirmation shown before absences are committed
#[async_trait]
pub trait AbsencePrompt: Send + Sync {
    async fn confirm_unexplained_absences(&self, absent_count: usize) -> AbsenceDecision;
}

/// Prompt that always answers the same way (headless runs, tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub AbsenceDecision);

#[async_trait]
impl AbsencePrompt for FixedDecision {
    async fn confirm_unexplained_absences(&self, absent_count: usize) -> AbsenceDecision {
        info!(
            "Answering absence confirmation for {} children with {:?}",
            absent_count, self.0
        );
        self.0
    }
}

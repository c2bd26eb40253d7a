//! User-facing outcome messages.
//!
//! A sink is fire-and-forget: it has no way to report failure back, so a
//! committed transaction can never be undone by a notification problem.

use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, kind: NotificationKind);
}

/// Sink that emits every notification as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, message: &str, kind: NotificationKind) {
        info!(kind = ?kind, "{message}");
    }
}

/// Sink that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, NotificationKind)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, NotificationKind)> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<(String, NotificationKind)> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, message: &str, kind: NotificationKind) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((message.to_string(), kind));
    }
}

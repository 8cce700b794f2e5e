//! User-visible notifications raised by the lifecycle controller.
//!
//! The interactive dashboard overlay that buffers these while open and
//! flushes them every 500ms is out of scope for this crate (SPEC_FULL
//! §1/§5); an embedding host that has one supplies its own
//! [`NotificationSink`]. The default just logs immediately — lossless,
//! unbuffered, and good enough for a headless run.

use tracing::{info, warn};

/// A user-visible event raised outside the normal message flow: crashes,
/// registration timeouts, and the like.
#[derive(Debug, Clone)]
pub struct Notification {
    pub agent: String,
    pub summary: String,
    pub detail: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Default sink: emit a `tracing` event immediately, no buffering.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info => info!(agent = %notification.agent, summary = %notification.summary, "notification"),
            Severity::Warning => warn!(
                agent = %notification.agent,
                summary = %notification.summary,
                detail = ?notification.detail,
                "notification"
            ),
        }
    }
}

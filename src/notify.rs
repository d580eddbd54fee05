//! Notification delivery seam.
//!
//! The kernel emits notification intents; actual transports (SMTP, push,
//! webhooks) live outside it. The daemon renders intents into
//! [`Notification`]s and hands them to whichever sink is configured.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A rendered notification ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Delivery backend. Implementations may run asynchronously; the kernel
/// never waits on delivery or retries it.
pub trait NotificationSink: Send {
    fn deliver(&mut self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the process log. Default sink for deployments
/// without a configured transport.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        log::info!("{}: {}", notification.subject, notification.body);
        Ok(())
    }
}

/// Buffers notifications in memory. Test sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub delivered: Vec<Notification>,
}

impl NotificationSink for MemorySink {
    fn deliver(&mut self, notification: &Notification) -> Result<()> {
        self.delivered.push(notification.clone());
        Ok(())
    }
}

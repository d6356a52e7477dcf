//! Push notification seam.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

/// Delivery errors. Logged by the dispatcher, never retried.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Notification rejected: {0}")]
    Rejected(String),

    #[error("Transport failure: {0}")]
    Http(String),

    #[error("Unreadable transport response: {0}")]
    Decode(String),
}

/// Sends one push notification to a device token.
pub trait NotificationTransport: Send + Sync {
    /// Deliver and return the provider's message id.
    fn send(&self, token: &str, title: &str, body: &str) -> Result<String, TransportError>;
}

/// A notification captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub token: String,
    pub title: String,
    pub body: String,
}

/// In-memory transport for tests and demos.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentNotification>>,
    fail: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later send fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl NotificationTransport for MockTransport {
    fn send(&self, token: &str, title: &str, body: &str) -> Result<String, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Http("mock transport offline".into()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| TransportError::Http("mock transport poisoned".into()))?;
        sent.push(SentNotification {
            token: token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(format!("mock-{}", sent.len()))
    }
}

//! Notification transports available to the daemon.

use medlink_core::reminders::{NotificationTransport, TransportError};

/// Logs notifications instead of sending them.
#[derive(Debug, Default)]
pub struct LogTransport;

impl NotificationTransport for LogTransport {
    fn send(&self, token: &str, title: &str, body: &str) -> Result<String, TransportError> {
        tracing::info!(token, title, body, "Notification (log only)");
        Ok(format!("log-{}", chrono::Utc::now().timestamp_millis()))
    }
}

#[cfg(feature = "expo-push")]
pub use expo::ExpoPushTransport;

#[cfg(feature = "expo-push")]
mod expo {
    use serde::{Deserialize, Serialize};

    use super::{NotificationTransport, TransportError};

    pub const DEFAULT_EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

    #[derive(Serialize)]
    struct PushMessage<'a> {
        to: &'a str,
        title: &'a str,
        body: &'a str,
        sound: &'a str,
    }

    #[derive(Deserialize)]
    struct PushResponse {
        data: PushTicket,
    }

    #[derive(Deserialize)]
    struct PushTicket {
        status: String,
        id: Option<String>,
        message: Option<String>,
    }

    /// Sends through the Expo push service. Blocking; call off the async runtime.
    pub struct ExpoPushTransport {
        client: reqwest::blocking::Client,
        url: String,
    }

    impl ExpoPushTransport {
        pub fn new(url: Option<String>) -> Self {
            Self {
                client: reqwest::blocking::Client::new(),
                url: url.unwrap_or_else(|| DEFAULT_EXPO_PUSH_URL.to_string()),
            }
        }
    }

    impl NotificationTransport for ExpoPushTransport {
        fn send(&self, token: &str, title: &str, body: &str) -> Result<String, TransportError> {
            let message = PushMessage {
                to: token,
                title,
                body,
                sound: "default",
            };

            let response = self
                .client
                .post(&self.url)
                .json(&message)
                .send()
                .map_err(|e| TransportError::Http(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Http(format!("Expo push returned {}", status)));
            }

            let parsed: PushResponse = response
                .json()
                .map_err(|e| TransportError::Decode(e.to_string()))?;

            match parsed.data.status.as_str() {
                "ok" => Ok(parsed.data.id.unwrap_or_default()),
                _ => Err(TransportError::Rejected(
                    parsed.data.message.unwrap_or_else(|| "unknown error".to_string()),
                )),
            }
        }
    }

}

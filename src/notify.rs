//! Discord-style webhook announcements for finished sessions.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{NotifyError, Result};
use crate::report::{ResultNotifier, SessionResult};

pub const WEBHOOK_ENV: &str = "DISCORD_WEBHOOK_URL";

const EMBED_TITLE: &str = "New Typing Test Result";
const EMBED_COLOR: u32 = 0x00ff00;
const ANONYMOUS: &str = "Anonymous";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_POLL: Duration = Duration::from_millis(20);

/// Posts results to a webhook. Clones share the in-flight requests.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    username: Option<String>,
    /// `None` when the HTTP client could not be built
    client: Option<reqwest::blocking::Client>,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, username: Option<String>) -> Self {
        let client = match reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
        {
            Ok(client) => Some(client),
            Err(err) => {
                warn!(error = %err, "webhook client unavailable, results will not be posted");
                None
            }
        };
        Self {
            url: url.into(),
            username,
            client,
            in_flight: Arc::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Embed body for `result`, stamped with `at`.
    pub fn payload(&self, result: &SessionResult, at: DateTime<Utc>) -> Value {
        let user = self
            .username
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(ANONYMOUS);

        json!({
            "embeds": [{
                "title": EMBED_TITLE,
                "color": EMBED_COLOR,
                "fields": [
                    { "name": "User", "value": user, "inline": true },
                    { "name": "WPM", "value": result.wpm.to_string(), "inline": true },
                    { "name": "Accuracy", "value": format!("{}%", result.accuracy), "inline": true },
                    { "name": "Time", "value": format!("{} seconds", result.elapsed_secs), "inline": true },
                ],
                "timestamp": at.to_rfc3339(),
            }]
        })
    }

    /// Send the payload and wait for the response (blocking).
    pub fn post(&self, result: &SessionResult) -> std::result::Result<(), NotifyError> {
        let client = self.client.as_ref().ok_or(NotifyError::ClientUnavailable)?;
        let response = client
            .post(&self.url)
            .json(&self.payload(result, Utc::now()))
            .send()
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "webhook accepted result");
            Ok(())
        } else {
            Err(NotifyError::Status(status.as_u16()))
        }
    }
}

impl ResultNotifier for WebhookNotifier {
    /// Posts on a background thread; the outcome is only logged.
    fn notify(&self, result: &SessionResult) -> Result<()> {
        let notifier = self.clone();
        let result = *result;
        let handle = thread::spawn(move || {
            if let Err(err) = notifier.post(&result) {
                warn!(error = %err, "webhook notification failed");
            }
        });
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.retain(|h| !h.is_finished());
            in_flight.push(handle);
        }
        Ok(())
    }

    /// Waits up to `deadline` for in-flight posts. Requests still running
    /// after that are abandoned.
    fn flush(&self, deadline: Duration) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        let started = Instant::now();
        while in_flight.iter().any(|h| !h.is_finished()) && started.elapsed() < deadline {
            thread::sleep(FLUSH_POLL);
        }

        let (done, pending): (Vec<_>, Vec<_>) =
            in_flight.drain(..).partition(|h| h.is_finished());
        for handle in done {
            let _ = handle.join();
        }
        if !pending.is_empty() {
            debug!(pending = pending.len(), "abandoning webhook posts on exit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result() -> SessionResult {
        SessionResult {
            wpm: 72,
            accuracy: 96,
            elapsed_secs: 60,
            errors: 3,
            keystrokes: 380,
            completion: 100.0,
            raw_wpm: 75,
            net_wpm: 72,
            characters: 360,
            words: 70,
        }
    }

    fn field<'a>(payload: &'a Value, name: &str) -> &'a Value {
        payload["embeds"][0]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == name)
            .map(|f| &f["value"])
            .unwrap()
    }

    #[test]
    fn payload_carries_result_fields() {
        let notifier = WebhookNotifier::new("https://example.invalid/hook", Some("ada".into()));
        let at = Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap();
        let payload = notifier.payload(&result(), at);

        let embed = &payload["embeds"][0];
        assert_eq!(embed["title"], EMBED_TITLE);
        assert_eq!(embed["color"], 0x00ff00);
        assert_eq!(embed["timestamp"], "2024-06-20T12:00:00+00:00");
        assert_eq!(field(&payload, "User"), "ada");
        assert_eq!(field(&payload, "WPM"), "72");
        assert_eq!(field(&payload, "Accuracy"), "96%");
        assert_eq!(field(&payload, "Time"), "60 seconds");
    }

    #[test]
    fn missing_username_is_anonymous() {
        let at = Utc::now();
        for username in [None, Some("   ".to_string())] {
            let notifier = WebhookNotifier::new("https://example.invalid/hook", username);
            assert_eq!(field(&notifier.payload(&result(), at), "User"), ANONYMOUS);
        }
    }

    #[test]
    fn unreachable_webhook_reports_network_error() {
        // port 9 on localhost is expected to refuse the connection
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", None);
        assert!(matches!(
            notifier.post(&result()),
            Err(NotifyError::Network(_))
        ));
    }

    #[test]
    fn notify_never_fails_the_caller() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", None);
        assert!(notifier.notify(&result()).is_ok());
    }

    #[test]
    fn flush_waits_for_in_flight_posts() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", None);
        notifier.notify(&result()).unwrap();
        notifier.notify(&result()).unwrap();

        notifier.flush(Duration::from_secs(5));

        assert!(notifier.in_flight.lock().unwrap().is_empty());
    }

    #[test]
    fn flush_gives_up_after_deadline() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", None);
        let slow = thread::spawn(|| thread::sleep(Duration::from_millis(500)));
        notifier.in_flight.lock().unwrap().push(slow);

        let started = Instant::now();
        notifier.flush(Duration::from_millis(50));

        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(notifier.in_flight.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_client_is_reported_by_post() {
        let notifier = WebhookNotifier {
            client: None,
            ..WebhookNotifier::new("https://example.invalid/hook", None)
        };

        assert!(matches!(
            notifier.post(&result()),
            Err(NotifyError::ClientUnavailable)
        ));
    }
}

//! Uploads JSON payloads to a user-configured endpoint.
//!
//! Transport failures never surface as errors: they are reported in the
//! returned [`SendOutcome`] so callers can show them as-is.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Timeout for a single upload.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("only HTTP or HTTPS URLs are allowed: {0}")]
    InvalidScheme(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response: String,
    pub error: Option<String>,
}

impl SendOutcome {
    fn failed(status_code: Option<u16>, response: String, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            response,
            error: Some(error.into()),
        }
    }
}

/// Checks that `url` uses `http://` or `https://`. An empty URL is allowed
/// and means "not configured".
pub fn validate_url(url: &str) -> Result<(), RemoteError> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(());
    }

    let lower = url.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(())
    } else {
        Err(RemoteError::InvalidScheme(url.to_string()))
    }
}

/// Cloning is cheap: clones share one connection pool.
#[derive(Debug, Clone)]
pub struct RemoteSender {
    client: reqwest::Client,
    url: Option<String>,
}

impl RemoteSender {
    /// Builds a sender with a 10 second request timeout. A blank URL means
    /// "not configured".
    pub fn new(url: Option<String>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;

        Ok(Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
        })
    }

    /// Replaces the destination URL after validating its scheme.
    pub fn set_url(&mut self, url: &str) -> Result<(), RemoteError> {
        validate_url(url)?;
        self.url = Some(url.trim().to_string()).filter(|u| !u.is_empty());
        Ok(())
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// POSTs `payload` as JSON.
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> SendOutcome {
        let Some(url) = self.url.as_deref() else {
            return SendOutcome::failed(None, String::new(), "Remote URL not set.");
        };

        if let Err(e) = validate_url(url) {
            return SendOutcome::failed(None, String::new(), e.to_string());
        }

        let response = match self.client.post(url).json(payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "remote send failed");
                return SendOutcome::failed(e.status().map(|s| s.as_u16()), String::new(), e.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            info!(url, status = status.as_u16(), "remote send succeeded");
            SendOutcome {
                success: true,
                status_code: Some(status.as_u16()),
                response: body,
                error: None,
            }
        } else {
            warn!(url, status = status.as_u16(), "remote endpoint rejected payload");
            SendOutcome::failed(
                Some(status.as_u16()),
                body,
                format!("HTTP {}", status),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/ingest").is_ok());
        assert!(validate_url("HTTP://example.com").is_ok());
        assert!(validate_url("").is_ok());
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(RemoteError::InvalidScheme(ref url)) if url == "ftp://example.com"
        ));
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_set_url_rejects_bad_scheme() {
        let mut sender = RemoteSender::new(None).unwrap();
        assert!(sender.set_url("javascript:alert(1)").is_err());
        assert_eq!(sender.url(), None);

        sender.set_url("https://example.com").unwrap();
        assert_eq!(sender.url(), Some("https://example.com"));

        sender.set_url("").unwrap();
        assert_eq!(sender.url(), None);
    }

    #[tokio::test]
    async fn test_send_without_url() {
        let sender = RemoteSender::new(Some("   ".to_string())).unwrap();
        let outcome = sender.send(&serde_json::json!({"a": 1})).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Remote URL not set."));
        assert_eq!(outcome.status_code, None);
    }

    #[tokio::test]
    async fn test_send_to_unreachable_host() {
        // nothing listens on the discard port
        let sender = RemoteSender::new(Some("http://127.0.0.1:9/ingest".to_string())).unwrap();
        let outcome = sender.send(&serde_json::json!({"a": 1})).await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}

use crate::links::DEFAULT_LINK_MARKER;
use crate::models::{StallWarning, StreamMessage};
use std::time::Duration;

/// Text the streaming API includes in authentication failures
pub const AUTH_FAILURE_TEXT: &str =
    "Authentication credentials (https://dev.twitter.com/pages/auth) were missing or incorrect";

/// The event kinds the watcher acts on
///
/// Transports translate their raw callbacks into these and drop everything
/// else (deletions, follows, list changes, ...) before it reaches the watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Message(StreamMessage),
    Connect,
    Disconnect,
    /// The transport has given up on the connection and released it
    CleanUp,
    Error(StreamError),
    Stall(StallWarning),
}

/// Classification of an asynchronous stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    AuthenticationFailure,
    Generic,
}

/// Error delivered by the transport while the stream is open
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct StreamError {
    pub kind: StreamErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl StreamError {
    /// Build an error from a message, classifying it by its text
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if message.contains(AUTH_FAILURE_TEXT) {
            StreamErrorKind::AuthenticationFailure
        } else {
            StreamErrorKind::Generic
        };
        Self {
            kind,
            status: None,
            message,
        }
    }

    /// Build an error from an HTTP status; 401 is an authentication failure
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let mut error = Self::new(body);
        error.status = Some(status);
        if status == 401 {
            error.kind = StreamErrorKind::AuthenticationFailure;
        }
        error
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self {
            kind: StreamErrorKind::AuthenticationFailure,
            status: Some(401),
            message: message.into(),
        }
    }

    pub fn is_authentication_failure(&self) -> bool {
        self.kind == StreamErrorKind::AuthenticationFailure
    }
}

/// Configuration for the watcher and its bundled HTTP adapters
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Base URL of the REST API used for account lookups
    pub api_base_url: String,
    /// Filter endpoint of the streaming API
    pub stream_url: String,
    /// Marker identifying shortened links in message text
    pub link_marker: String,
    /// How long the stream may stay silent before the connection is dropped
    pub read_timeout: Duration,
    /// Timeout for establishing connections
    pub connect_timeout: Duration,
    /// First delay before reconnecting a dropped stream
    pub reconnect_backoff: Duration,
    /// Upper bound for the reconnect delay
    pub max_reconnect_backoff: Duration,
    /// Timeout for each unshortening request
    pub unshorten_timeout: Duration,
    /// Maximum redirects followed when unshortening a link
    pub max_redirects: u8,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.twitter.com/1.1".to_string(),
            stream_url: "https://stream.twitter.com/1.1/statuses/filter.json".to_string(),
            link_marker: DEFAULT_LINK_MARKER.to_string(),
            read_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(20),
            reconnect_backoff: Duration::from_secs(5),
            max_reconnect_backoff: Duration::from_secs(320),
            unshorten_timeout: Duration::from_secs(10),
            max_redirects: 5,
        }
    }
}

impl WatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for long unattended runs
    pub fn production() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(10),
            max_reconnect_backoff: Duration::from_secs(600),
            ..Self::default()
        }
    }

    /// Short timeouts, for tests and local endpoints
    pub fn minimal() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            reconnect_backoff: Duration::from_millis(100),
            max_reconnect_backoff: Duration::from_secs(1),
            unshorten_timeout: Duration::from_secs(2),
            max_redirects: 2,
            ..Self::default()
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Result<Self, String> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("API base URL must be http(s): {}", url));
        }
        self.api_base_url = url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Result<Self, String> {
        let url = url.into();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("Stream URL must be http(s): {}", url));
        }
        self.stream_url = url;
        Ok(self)
    }

    pub fn with_link_marker(mut self, marker: impl Into<String>) -> Result<Self, String> {
        let marker = marker.into();
        if marker.is_empty() {
            return Err("Link marker cannot be empty".to_string());
        }
        self.link_marker = marker;
        Ok(self)
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Result<Self, String> {
        if timeout.is_zero() {
            return Err("Read timeout must be greater than 0".to_string());
        }
        self.read_timeout = timeout;
        Ok(self)
    }

    /// Set the reconnect backoff range
    pub fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Result<Self, String> {
        if initial.is_zero() {
            return Err("Reconnect backoff must be greater than 0".to_string());
        }
        if initial > max {
            return Err("Initial reconnect backoff exceeds the maximum".to_string());
        }
        self.reconnect_backoff = initial;
        self.max_reconnect_backoff = max;
        Ok(self)
    }

    pub fn with_max_redirects(mut self, max_redirects: u8) -> Result<Self, String> {
        if max_redirects > 20 {
            return Err("Too many redirects (max 20)".to_string());
        }
        self.max_redirects = max_redirects;
        Ok(self)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.link_marker.is_empty() {
            return Err("Link marker cannot be empty".to_string());
        }
        if self.read_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err("Timeouts must be greater than 0".to_string());
        }
        if self.reconnect_backoff.is_zero() || self.reconnect_backoff > self.max_reconnect_backoff {
            return Err("Invalid reconnect backoff range".to_string());
        }
        if self.max_redirects > 20 {
            return Err("Too many redirects (max 20)".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification_by_text() {
        let error = StreamError::new(format!("401:{}", AUTH_FAILURE_TEXT));
        assert!(error.is_authentication_failure());

        let error = StreamError::new("Connection reset by peer");
        assert_eq!(error.kind, StreamErrorKind::Generic);
        assert_eq!(error.status, None);
    }

    #[test]
    fn test_error_classification_by_status() {
        let error = StreamError::from_status(401, "Unauthorized");
        assert!(error.is_authentication_failure());
        assert_eq!(error.status, Some(401));

        let error = StreamError::from_status(420, "Enhance Your Calm");
        assert!(!error.is_authentication_failure());
    }

    #[test]
    fn test_watcher_config_default() {
        let config = WatcherConfig::default();
        assert_eq!(config.link_marker, "t.co/");
        assert_eq!(config.read_timeout, Duration::from_secs(90));
        assert!(config.validate().is_ok());
        assert!(WatcherConfig::production().validate().is_ok());
        assert!(WatcherConfig::minimal().validate().is_ok());
    }

    #[test]
    fn test_watcher_config_validation() {
        assert!(WatcherConfig::new().with_link_marker("").is_err());
        assert!(WatcherConfig::new().with_read_timeout(Duration::ZERO).is_err());
        assert!(WatcherConfig::new().with_api_base_url("ftp://example.com").is_err());
        assert!(WatcherConfig::new().with_max_redirects(50).is_err());
        assert!(WatcherConfig::new()
            .with_reconnect_backoff(Duration::from_secs(10), Duration::from_secs(1))
            .is_err());

        let config = WatcherConfig::new()
            .with_api_base_url("http://localhost:8080/1.1/")
            .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080/1.1");
    }
}

/// Error types surfaced by the feed watcher
///
/// Configuration mistakes are reported synchronously as `InvalidInput`.
/// Everything that happens on the delivery thread is converted into status
/// notifications instead, so these variants only cross the public API from
/// configuration and control calls.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to start streaming: {0}")]
    StartupFailure(String),

    #[error("Account lookup failed for @{handle}: {message}")]
    Lookup { handle: String, message: String },

    #[error("Stream transport error: {0}")]
    Transport(String),

    #[error("Failed to parse shortened link: {0}")]
    Parse(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Failed to unshorten {link}: {message}")]
    Unshorten { link: String, message: String },
}

impl FeedError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        FeedError::InvalidInput(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        FeedError::Parse(message.into())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Http(format!("request timed out: {}", err))
        } else {
            FeedError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Transport(format!("malformed payload: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

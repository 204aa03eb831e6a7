//! HTTP adapters for the streaming API
//!
//! These implement the collaborator traits from `streaming` on top of
//! `reqwest::blocking`: account lookups, the filtered stream itself and link
//! unshortening. Requests to the API are signed with OAuth 1.0a.

pub mod oauth;
pub mod rest;
pub mod stream;
pub mod unshorten;

pub use rest::HttpFeedClient;
pub use stream::{HttpStreamHandle, HttpStreamTransport};
pub use unshorten::HttpUnshortener;

use crate::error::{FeedError, Result};

/// The four OAuth strings identifying the application and the user
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl Credentials {
    /// Build credentials from consumer key, consumer secret, access token
    /// and access token secret, in that order
    pub fn from_keys(keys: &[&str]) -> Result<Self> {
        let [consumer_key, consumer_secret, access_token, access_token_secret] = keys else {
            return Err(FeedError::invalid_input(format!(
                "Expected exactly four API keys, got {}",
                keys.len()
            )));
        };
        if keys.iter().any(|key| key.trim().is_empty()) {
            return Err(FeedError::invalid_input("API keys cannot be empty"));
        }

        Ok(Self {
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
            access_token: access_token.to_string(),
            access_token_secret: access_token_secret.to_string(),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

/// Build a blocking HTTP client, mapping builder failures
pub(crate) fn build_http_client(
    builder: reqwest::blocking::ClientBuilder,
) -> Result<reqwest::blocking::Client> {
    builder
        .user_agent(concat!("linkwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FeedError::Http(format!("failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_four_keys() {
        assert!(matches!(
            Credentials::from_keys(&["a", "b", "c"]),
            Err(FeedError::InvalidInput(_))
        ));
        assert!(Credentials::from_keys(&["a", "b", "c", "d", "e"]).is_err());
        assert!(Credentials::from_keys(&[]).is_err());
        assert!(Credentials::from_keys(&["a", "", "c", "d"]).is_err());

        let credentials = Credentials::from_keys(&["a", "b", "c", "d"]).unwrap();
        assert_eq!(credentials.consumer_key, "a");
        assert_eq!(credentials.access_token_secret, "d");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials::from_keys(&["key", "secret1", "token", "secret2"]).unwrap();
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("key"));
        assert!(!debug.contains("secret1"));
        assert!(!debug.contains("secret2"));
    }
}

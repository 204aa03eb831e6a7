use super::oauth::authorization_header;
use super::stream::HttpStreamTransport;
use super::{build_http_client, Credentials};
use crate::error::{FeedError, Result};
use crate::models::{AccountId, FilterQuery};
use crate::streaming::transport::{AccountLookup, EventSink, StreamHandle, StreamTransport};
use crate::streaming::WatcherConfig;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: u64,
    #[serde(default)]
    screen_name: Option<String>,
}

/// Authenticated client for the REST and streaming APIs
pub struct HttpFeedClient {
    http: reqwest::blocking::Client,
    credentials: Credentials,
    config: WatcherConfig,
    stream: HttpStreamTransport,
}

impl std::fmt::Debug for HttpFeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFeedClient")
            .field("credentials", &self.credentials)
            .field("api_base_url", &self.config.api_base_url)
            .finish()
    }
}

impl HttpFeedClient {
    pub fn new(credentials: Credentials, config: WatcherConfig) -> Result<Self> {
        let http = build_http_client(
            reqwest::blocking::Client::builder()
                .connect_timeout(config.connect_timeout)
                .timeout(config.connect_timeout * 2),
        )?;
        let stream = HttpStreamTransport::new(credentials.clone(), config.clone())?;

        Ok(Self {
            http,
            credentials,
            config,
            stream,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl AccountLookup for HttpFeedClient {
    fn lookup(&self, handle: &str) -> Result<AccountId> {
        let url = format!("{}/users/show.json", self.config.api_base_url);
        let params = [("screen_name", handle)];
        let lookup_error = |message: String| FeedError::Lookup {
            handle: handle.to_string(),
            message,
        };

        let auth = authorization_header(&self.credentials, "GET", &url, &params)?;
        let response = self
            .http
            .get(&url)
            .query(&params)
            .header(AUTHORIZATION, auth)
            .send()
            .map_err(|e| lookup_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(lookup_error(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        let user: UserResponse = response
            .json()
            .map_err(|e| lookup_error(format!("unexpected response: {}", e)))?;
        log::debug!(
            "Looked up @{} (canonical @{}) as {}",
            handle,
            user.screen_name.as_deref().unwrap_or(handle),
            user.id
        );
        Ok(AccountId::new(user.id))
    }
}

impl StreamTransport for HttpFeedClient {
    fn open(&self, filter: &FilterQuery, sink: EventSink) -> Result<Box<dyn StreamHandle>> {
        self.stream.open(filter, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_parsing() {
        let user: UserResponse =
            serde_json::from_str(r#"{"id": 2244994945, "screen_name": "Official_PAX", "name": "PAX"}"#)
                .unwrap();
        assert_eq!(user.id, 2244994945);
        assert_eq!(user.screen_name.as_deref(), Some("Official_PAX"));

        let user: UserResponse = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(user.screen_name, None);
    }

    #[test]
    fn test_client_builds_from_credentials() {
        let credentials = Credentials::from_keys(&["a", "b", "c", "d"]).unwrap();
        let client = HttpFeedClient::new(credentials, WatcherConfig::minimal()).unwrap();
        assert_eq!(client.credentials().consumer_key, "a");
    }
}

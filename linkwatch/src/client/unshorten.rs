use super::build_http_client;
use crate::error::{FeedError, Result};
use crate::links::LinkUnshortener;
use crate::streaming::WatcherConfig;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::Url;

/// Follows redirect chains with HEAD requests to find where a short link
/// lands
///
/// Redirects are followed by hand so the chain can stop at `max_redirects`
/// and still report the last hop instead of failing outright.
pub struct HttpUnshortener {
    http: reqwest::blocking::Client,
    max_redirects: u8,
}

impl std::fmt::Debug for HttpUnshortener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUnshortener")
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

impl HttpUnshortener {
    pub fn new(config: &WatcherConfig) -> Result<Self> {
        let http = build_http_client(
            reqwest::blocking::Client::builder()
                .redirect(Policy::none())
                .timeout(config.unshorten_timeout),
        )?;
        Ok(Self {
            http,
            max_redirects: config.max_redirects,
        })
    }
}

/// Resolve a `Location` header against the URL that sent it
fn next_hop(current: &Url, location: &str) -> Option<Url> {
    current.join(location).ok()
}

impl LinkUnshortener for HttpUnshortener {
    fn unshorten(&self, link: &str) -> Result<String> {
        let unshorten_error = |message: String| FeedError::Unshorten {
            link: link.to_string(),
            message,
        };

        let mut current = Url::parse(link).map_err(|e| unshorten_error(e.to_string()))?;
        for hop in 0..self.max_redirects {
            let response = self
                .http
                .head(current.clone())
                .send()
                .map_err(|e| unshorten_error(e.to_string()))?;

            if !response.status().is_redirection() {
                log::debug!("{} resolved after {} redirect(s)", link, hop);
                return Ok(current.to_string());
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| {
                    unshorten_error(format!("redirect {} without a Location header", response.status()))
                })?;
            current = next_hop(&current, location)
                .ok_or_else(|| unshorten_error(format!("invalid redirect target: {}", location)))?;
        }

        log::debug!("Stopped following {} after {} redirects", link, self.max_redirects);
        Ok(current.to_string())
    }
}

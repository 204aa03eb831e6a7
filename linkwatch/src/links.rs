use crate::error::{FeedError, Result};
use std::sync::Arc;

/// Marker that every shortened link in a message contains
pub const DEFAULT_LINK_MARKER: &str = "t.co/";

/// Resolves a shortened link to the link it points at
pub trait LinkUnshortener: Send + Sync {
    fn unshorten(&self, link: &str) -> Result<String>;
}

/// Scans message text for shortened links and resolves them one at a time
pub struct LinkExtractor {
    marker: String,
    unshortener: Arc<dyn LinkUnshortener>,
}

impl std::fmt::Debug for LinkExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkExtractor")
            .field("marker", &self.marker)
            .finish()
    }
}

impl LinkExtractor {
    pub fn new(marker: impl Into<String>, unshortener: Arc<dyn LinkUnshortener>) -> Self {
        Self {
            marker: marker.into(),
            unshortener,
        }
    }

    pub fn with_default_marker(unshortener: Arc<dyn LinkUnshortener>) -> Self {
        Self::new(DEFAULT_LINK_MARKER, unshortener)
    }

    /// Extract, resolve and emit every shortened link in `text`
    ///
    /// Each link is handed to `emit` as soon as it has been resolved, in
    /// left-to-right order. Resolution blocks, so a slow unshortener delays
    /// the rest of the message. A link that fails to resolve is emitted in
    /// its shortened form. A marker without a path is skipped.
    ///
    /// Returns the number of links emitted. A token whose span does not fit
    /// the text, or a scan that stops advancing, aborts with
    /// `FeedError::Parse`; links emitted before it stay emitted.
    pub fn extract_links<F>(&self, text: &str, mut emit: F) -> Result<usize>
    where
        F: FnMut(String),
    {
        let mut cursor = 0;
        let mut emitted = 0;

        while let Some((start, end)) = self.next_link(text, cursor) {
            if end <= cursor {
                return Err(FeedError::parse("scanner did not advance"));
            }
            let token = text.get(start..end).ok_or_else(|| {
                FeedError::parse(format!("token at {}..{} not found in text", start, end))
            })?;
            cursor = end;

            let shortened = normalize_link(token);
            let link = match self.unshortener.unshorten(&shortened) {
                Ok(link) => link,
                Err(e) => {
                    log::warn!("Could not unshorten {}: {}", shortened, e);
                    shortened
                }
            };
            log::info!("Link found: {}", link);
            emit(link);
            emitted += 1;
        }

        Ok(emitted)
    }

    /// Byte span of the next link token at or after `from`
    ///
    /// The token starts at the marker, or at an `http://`/`https://` scheme
    /// directly in front of it, and runs over the ASCII alphanumeric path.
    fn next_link(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        let mut cursor = from;
        loop {
            let marker_at = cursor + text.get(cursor..)?.find(self.marker.as_str())?;
            let path_start = marker_at + self.marker.len();
            let path_len = text[path_start..]
                .find(|c: char| !c.is_ascii_alphanumeric())
                .unwrap_or(text.len() - path_start);

            if path_len == 0 {
                log::debug!("Skipping shortened link marker without a path at {}", marker_at);
                cursor = path_start;
                continue;
            }

            let before = &text[..marker_at];
            let start = ["https://", "http://"]
                .into_iter()
                .find(|scheme| before.ends_with(scheme))
                .map_or(marker_at, |scheme| marker_at - scheme.len());
            return Some((start, path_start + path_len));
        }
    }
}

/// Give a scheme-less token an https scheme
pub fn normalize_link(token: &str) -> String {
    if token.starts_with("https://") || token.starts_with("http://") {
        token.to_string()
    } else {
        format!("https://{}", token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Unshortener {}

        impl LinkUnshortener for Unshortener {
            fn unshorten(&self, link: &str) -> Result<String>;
        }
    }

    fn echo_extractor() -> LinkExtractor {
        let mut unshortener = MockUnshortener::new();
        unshortener
            .expect_unshorten()
            .returning(|link| Ok(format!("resolved:{}", link)));
        LinkExtractor::with_default_marker(Arc::new(unshortener))
    }

    fn collect(extractor: &LinkExtractor, text: &str) -> (Result<usize>, Vec<String>) {
        let mut links = Vec::new();
        let result = extractor.extract_links(text, |link| links.push(link));
        (result, links)
    }

    #[test]
    fn test_no_links() {
        let (result, links) = collect(&echo_extractor(), "Badges go on sale tomorrow");
        assert_eq!(result.unwrap(), 0);
        assert!(links.is_empty());
    }

    #[test]
    fn test_links_emitted_in_order() {
        let text = "East https://t.co/AAA1 then West http://t.co/bbb2 and t.co/Ccc3";
        let (result, links) = collect(&echo_extractor(), text);

        assert_eq!(result.unwrap(), 3);
        assert_eq!(
            links,
            vec![
                "resolved:https://t.co/AAA1",
                "resolved:http://t.co/bbb2",
                "resolved:https://t.co/Ccc3",
            ]
        );
    }

    #[test]
    fn test_repeated_token_found_twice() {
        let text = "https://t.co/same and again https://t.co/same";
        let (result, links) = collect(&echo_extractor(), text);

        assert_eq!(result.unwrap(), 2);
        assert_eq!(links[0], links[1]);
    }

    #[test]
    fn test_token_trims_surrounding_punctuation() {
        let (result, links) = collect(&echo_extractor(), "Tickets (https://t.co/xYz9).");
        assert_eq!(result.unwrap(), 1);
        assert_eq!(links, vec!["resolved:https://t.co/xYz9"]);
    }

    #[test]
    fn test_marker_without_path_is_skipped() {
        let (result, links) = collect(&echo_extractor(), "see t.co/ then https://t.co/abc3 and https://t.co/");

        assert_eq!(result.unwrap(), 1);
        assert_eq!(links, vec!["resolved:https://t.co/abc3"]);
    }

    #[test]
    fn test_token_glued_to_preceding_text() {
        let (result, links) = collect(&echo_extractor(), "Tickets:https://t.co/abc1");
        assert_eq!(result.unwrap(), 1);
        assert_eq!(links, vec!["resolved:https://t.co/abc1"]);

        let (result, links) = collect(&echo_extractor(), "PAX West→https://t.co/abc2 East→t.co/abc3");
        assert_eq!(result.unwrap(), 2);
        assert_eq!(
            links,
            vec!["resolved:https://t.co/abc2", "resolved:https://t.co/abc3"]
        );
    }

    #[test]
    fn test_scheme_only_taken_when_adjacent() {
        let (result, links) = collect(&echo_extractor(), "http:// t.co/a1 xhttps://t.co/b2");
        assert_eq!(result.unwrap(), 2);
        assert_eq!(
            links,
            vec!["resolved:https://t.co/a1", "resolved:https://t.co/b2"]
        );
    }

    #[test]
    fn test_failed_resolution_emits_shortened_link() {
        let mut unshortener = MockUnshortener::new();
        unshortener
            .expect_unshorten()
            .with(eq("https://t.co/down"))
            .times(1)
            .returning(|link| {
                Err(FeedError::Unshorten {
                    link: link.to_string(),
                    message: "connection refused".to_string(),
                })
            });
        let extractor = LinkExtractor::with_default_marker(Arc::new(unshortener));

        let (result, links) = collect(&extractor, "see t.co/down");
        assert_eq!(result.unwrap(), 1);
        assert_eq!(links, vec!["https://t.co/down"]);
    }

    #[test]
    fn test_custom_marker() {
        let mut unshortener = MockUnshortener::new();
        unshortener
            .expect_unshorten()
            .returning(|link| Ok(link.to_uppercase()));
        let extractor = LinkExtractor::new("bit.ly/", Arc::new(unshortener));

        let (result, links) = collect(&extractor, "go to bit.ly/abc now, ignore t.co/zzz");
        assert_eq!(result.unwrap(), 1);
        assert_eq!(links, vec!["HTTPS://BIT.LY/ABC"]);
    }

    #[test]
    fn test_normalize_link() {
        assert_eq!(normalize_link("t.co/a"), "https://t.co/a");
        assert_eq!(normalize_link("http://t.co/a"), "http://t.co/a");
        assert_eq!(normalize_link("https://t.co/a"), "https://t.co/a");
    }
}

use crate::error::{FeedError, Result};

/// Keyword filter applied to every incoming message
///
/// The filter fails open: when filtering is disabled, or enabled without any
/// keywords, every message passes. A misconfigured filter therefore never
/// silently drops all traffic.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    keywords: Vec<String>,
    enabled: bool,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword; matching is case-insensitive
    pub fn add_keyword(&mut self, keyword: &str) -> Result<()> {
        if keyword.is_empty() {
            return Err(FeedError::invalid_input("Keyword cannot be empty"));
        }
        self.keywords.push(keyword.to_lowercase());
        Ok(())
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Check whether a message passes the keyword filter
    ///
    /// Matching is substring based, not word based: the keyword `pax`
    /// matches `#PAXWest`.
    pub fn passes(&self, text: &str) -> bool {
        if !self.enabled {
            return true;
        }
        if self.keywords.is_empty() {
            log::warn!("Keyword filtering is enabled but the keyword list is empty");
            return true;
        }

        let text = text.to_lowercase();
        self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }
}

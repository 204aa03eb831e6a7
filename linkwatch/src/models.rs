use crate::error::{FeedError, Result};
use uuid::Uuid;

/// Stable numeric identifier of a feed account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(u64);

impl AccountId {
    pub fn new(id: u64) -> Self {
        AccountId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account whose posts are watched for links
///
/// Only the handle is stored; the numeric id is looked up every time the
/// stream is started, so renamed or recreated accounts are picked up on
/// restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedAccount {
    handle: String,
}

impl WatchedAccount {
    /// Parse a handle, stripping a single leading `@`
    pub fn parse(handle: &str) -> Result<Self> {
        let trimmed = handle.trim();
        let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if handle.is_empty() {
            return Err(FeedError::invalid_input("Account handle cannot be empty"));
        }
        Ok(Self {
            handle: handle.to_string(),
        })
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }
}

/// Filter sent to the transport when the stream is opened
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterQuery {
    pub follow: Vec<AccountId>,
}

impl FilterQuery {
    pub fn follow(ids: Vec<AccountId>) -> Self {
        Self { follow: ids }
    }

    /// Comma separated id list, as the filter endpoint expects it
    pub fn follow_param(&self) -> String {
        self.follow
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A post delivered by the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub author: String,
    pub text: String,
}

impl StreamMessage {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }
}

/// Warning that the client is falling behind the stream
#[derive(Debug, Clone, PartialEq)]
pub struct StallWarning {
    pub code: String,
    pub message: String,
    pub percent_full: u8,
}

impl std::fmt::Display for StallWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({}% full)",
            self.code, self.message, self.percent_full
        )
    }
}

/// Health of the stream connection as seen by the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Streaming has never been started
    #[default]
    Idle,
    /// A stream was opened and no connect event has arrived yet
    Connecting,
    Connected,
    /// The transport lost the connection and is retrying on its own
    Disconnected,
    /// The stream was cleaned up; only a manual restart reconnects
    ShutDown,
}

/// Identifies one start/cleanup cycle of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

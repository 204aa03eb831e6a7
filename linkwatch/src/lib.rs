//! Watch accounts on a push stream and report the links they post
//!
//! `StreamConnectionManager` owns the stream: it resolves the watched
//! accounts, opens a filtered stream through a `StreamTransport`, runs every
//! message through the keyword filter and the link extractor, and reports
//! links and connection changes to a `FeedConsumer`. Repeated stream errors
//! are escalated and eventually close the stream.

pub mod error;
pub mod models;
pub mod filter;
pub mod links;
pub mod streaming;
pub mod client;

// Re-export key types for easier access
pub use error::{FeedError, Result};
pub use models::{AccountId, ConnectionState, FilterQuery, SessionId, StallWarning, StreamMessage, WatchedAccount};
pub use filter::FilterEngine;
pub use links::{LinkExtractor, LinkUnshortener, DEFAULT_LINK_MARKER};
pub use streaming::{
    AccountLookup, ConsumerHandlers, EventSink, FeedConsumer, StartOutcome, StreamConnectionManager,
    StreamError, StreamEvent, StreamHandle, StreamTransport, WatcherConfig, DEFAULT_ACCOUNT,
};
pub use client::{Credentials, HttpFeedClient, HttpUnshortener};

pub mod types;
pub mod interface;
pub mod escalation;
pub mod lifecycle;
pub mod transport;
pub mod manager;

// Re-export key types for easier access
pub use types::{StreamError, StreamErrorKind, StreamEvent, WatcherConfig, AUTH_FAILURE_TEXT};
pub use interface::{ConsumerHandlers, FeedConsumer, Notification};
pub use escalation::{ErrorEscalationPolicy, EscalationAction, ESCALATION_THRESHOLD};
pub use lifecycle::{ConnectionLifecycle, Transition};
pub use transport::{AccountLookup, EventSink, StreamHandle, StreamTransport};
pub use manager::{StartOutcome, StreamConnectionManager, DEFAULT_ACCOUNT};

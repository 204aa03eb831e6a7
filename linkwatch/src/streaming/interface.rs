/// Callbacks through which the watcher reports to its consumer
///
/// All callbacks run on the stream's delivery thread, one at a time and in
/// arrival order. They should return quickly: a slow callback delays every
/// event behind it.
pub trait FeedConsumer: Send + Sync {
    /// A link was found and resolved
    fn on_link_found(&self, link: &str);

    /// The stream connected (or reconnected)
    fn on_connected(&self);

    /// The stream was shut down and will not reconnect by itself
    fn on_disconnected(&self);

    /// Human readable status: stalls, escalation warnings, retries
    fn on_status(&self, message: &str);
}

type LinkHandler = Box<dyn Fn(&str) + Send + Sync>;
type SignalHandler = Box<dyn Fn() + Send + Sync>;

/// Closure based `FeedConsumer`
///
/// Handlers that are not set are ignored.
///
/// # Example
///
/// ```rust
/// use linkwatch::ConsumerHandlers;
///
/// let handlers = ConsumerHandlers::new()
///     .with_link_found(|link| println!("Found {}", link))
///     .with_status(|status| println!("Status: {}", status));
/// ```
#[derive(Default)]
pub struct ConsumerHandlers {
    pub on_link_found: Option<LinkHandler>,
    pub on_connected: Option<SignalHandler>,
    pub on_disconnected: Option<SignalHandler>,
    pub on_status: Option<LinkHandler>,
}

impl ConsumerHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link_found<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_link_found = Some(Box::new(handler));
        self
    }

    pub fn with_connected<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_connected = Some(Box::new(handler));
        self
    }

    pub fn with_disconnected<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_disconnected = Some(Box::new(handler));
        self
    }

    pub fn with_status<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_status = Some(Box::new(handler));
        self
    }
}

impl std::fmt::Debug for ConsumerHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandlers")
            .field("on_link_found", &self.on_link_found.is_some())
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .field("on_status", &self.on_status.is_some())
            .finish()
    }
}

impl FeedConsumer for ConsumerHandlers {
    fn on_link_found(&self, link: &str) {
        if let Some(ref handler) = self.on_link_found {
            handler(link);
        }
    }

    fn on_connected(&self) {
        if let Some(ref handler) = self.on_connected {
            handler();
        }
    }

    fn on_disconnected(&self) {
        if let Some(ref handler) = self.on_disconnected {
            handler();
        }
    }

    fn on_status(&self, message: &str) {
        if let Some(ref handler) = self.on_status {
            handler(message);
        }
    }
}

/// Consumer notification produced by the lifecycle and escalation logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    LinkFound(String),
    Connected,
    Disconnected,
    Status(String),
}

impl Notification {
    pub fn status(message: impl Into<String>) -> Self {
        Notification::Status(message.into())
    }

    /// Deliver this notification, containing any panic raised by the consumer
    pub(crate) fn deliver(&self, consumer: &dyn FeedConsumer) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| match self {
            Notification::LinkFound(link) => consumer.on_link_found(link),
            Notification::Connected => consumer.on_connected(),
            Notification::Disconnected => consumer.on_disconnected(),
            Notification::Status(message) => consumer.on_status(message),
        }));
        if result.is_err() {
            log::error!("Consumer callback panicked while handling {:?}", self);
        }
    }
}

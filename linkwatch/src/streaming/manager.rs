use super::interface::{FeedConsumer, Notification};
use super::lifecycle::{ConnectionLifecycle, Transition};
use super::transport::{AccountLookup, EventSink, StreamHandle, StreamTransport};
use super::types::{StreamEvent, WatcherConfig};
use crate::client::{Credentials, HttpFeedClient, HttpUnshortener};
use crate::error::{FeedError, Result};
use crate::filter::FilterEngine;
use crate::links::{LinkExtractor, LinkUnshortener};
use crate::models::{ConnectionState, FilterQuery, SessionId, StreamMessage, WatchedAccount};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};

/// Account watched when the manager is built from an existing client
pub const DEFAULT_ACCOUNT: &str = "Official_PAX";

/// Result of a successful `start_streaming` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A stream was already held; nothing was done
    AlreadyStreaming,
}

#[derive(Debug, Default)]
struct Watchlist {
    accounts: Vec<WatchedAccount>,
    filter: FilterEngine,
}

/// Watches accounts on the streaming API and reports the links they post
///
/// Configure the manager with `add_account`, `add_keyword` and
/// `enable_keyword_filtering`, then call `start_streaming`. From then on the
/// transport's events are processed on a dedicated delivery thread: messages
/// go through the keyword filter and the link extractor, lifecycle events
/// through `ConnectionLifecycle`, and everything ends up at the
/// `FeedConsumer`.
///
/// # Example
///
/// ```rust,no_run
/// use linkwatch::{ConsumerHandlers, StreamConnectionManager, WatcherConfig};
/// use std::sync::Arc;
///
/// let consumer = ConsumerHandlers::new().with_link_found(|link| println!("{}", link));
/// let manager = StreamConnectionManager::from_keys(
///     &["consumer-key", "consumer-secret", "access-token", "access-secret"],
///     Arc::new(consumer),
///     WatcherConfig::default(),
/// )?;
/// manager.add_account("@Official_PAX")?;
/// manager.add_keyword("badges")?;
/// manager.enable_keyword_filtering();
/// manager.start_streaming()?;
/// # Ok::<(), linkwatch::FeedError>(())
/// ```
pub struct StreamConnectionManager {
    lookup: Arc<dyn AccountLookup>,
    transport: Arc<dyn StreamTransport>,
    extractor: Arc<LinkExtractor>,
    consumer: Arc<dyn FeedConsumer>,
    watchlist: Mutex<Watchlist>,
    lifecycle: Arc<ConnectionLifecycle>,
    /// Serializes concurrent `start_streaming` calls
    start_lock: Mutex<()>,
}

impl std::fmt::Debug for StreamConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnectionManager")
            .field("watchlist", &*self.watchlist())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

impl StreamConnectionManager {
    /// Build a manager from the four OAuth strings
    ///
    /// Expects, in order: consumer key, consumer secret, access token and
    /// access token secret. No account is watched by default.
    pub fn from_keys(
        keys: &[&str],
        consumer: Arc<dyn FeedConsumer>,
        config: WatcherConfig,
    ) -> Result<Self> {
        let credentials = Credentials::from_keys(keys)?;
        let client = Arc::new(HttpFeedClient::new(credentials, config.clone())?);
        let unshortener = Arc::new(HttpUnshortener::new(&config)?);
        log::info!("Feed client initialized");
        Self::with_parts(client.clone(), client, unshortener, consumer, config)
    }

    /// Build a manager around an already authenticated client
    ///
    /// The default account is watched from the start.
    pub fn new<C>(client: Arc<C>, consumer: Arc<dyn FeedConsumer>, config: WatcherConfig) -> Result<Self>
    where
        C: AccountLookup + StreamTransport + 'static,
    {
        let unshortener = Arc::new(HttpUnshortener::new(&config)?);
        let manager = Self::with_parts(client.clone(), client, unshortener, consumer, config)?;
        manager.add_account(DEFAULT_ACCOUNT)?;
        Ok(manager)
    }

    /// Build a manager from individual collaborators
    pub fn with_parts(
        lookup: Arc<dyn AccountLookup>,
        transport: Arc<dyn StreamTransport>,
        unshortener: Arc<dyn LinkUnshortener>,
        consumer: Arc<dyn FeedConsumer>,
        config: WatcherConfig,
    ) -> Result<Self> {
        config.validate().map_err(FeedError::InvalidInput)?;

        Ok(Self {
            lookup,
            transport,
            extractor: Arc::new(LinkExtractor::new(config.link_marker, unshortener)),
            consumer,
            watchlist: Mutex::new(Watchlist::default()),
            lifecycle: Arc::new(ConnectionLifecycle::new()),
            start_lock: Mutex::new(()),
        })
    }

    fn watchlist(&self) -> MutexGuard<'_, Watchlist> {
        self.watchlist.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Watch another account; a leading `@` is stripped
    ///
    /// Accounts are resolved when the stream starts, so an account added
    /// while streaming is only picked up by the next `start_streaming`.
    pub fn add_account(&self, handle: &str) -> Result<()> {
        let account = WatchedAccount::parse(handle)?;
        if self.is_streaming() {
            log::warn!(
                "@{} added while streaming; it is watched after the next restart",
                account.handle()
            );
        }
        log::debug!("Watching @{}", account.handle());
        self.watchlist().accounts.push(account);
        Ok(())
    }

    /// Add a keyword for the keyword filter
    pub fn add_keyword(&self, keyword: &str) -> Result<()> {
        self.watchlist().filter.add_keyword(keyword)
    }

    /// Only report links from messages containing one of the keywords
    pub fn enable_keyword_filtering(&self) {
        self.watchlist().filter.enable();
    }

    pub fn accounts(&self) -> Vec<String> {
        self.watchlist()
            .accounts
            .iter()
            .map(|account| account.handle().to_string())
            .collect()
    }

    pub fn keywords(&self) -> Vec<String> {
        self.watchlist().filter.keywords().to_vec()
    }

    /// Open the stream unless one is already open
    ///
    /// Every watched account is looked up first, one request per account; a
    /// single failed lookup fails the whole start. Failures are logged,
    /// reported through `on_status` on the calling thread and returned as
    /// `FeedError::StartupFailure`. No stream is held afterwards, so the call
    /// can simply be retried.
    pub fn start_streaming(&self) -> Result<StartOutcome> {
        let result = {
            let _start = self.start_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.try_start()
        };

        if let Err(ref e) = result {
            log::error!("{}", e);
            Notification::status(e.to_string()).deliver(self.consumer.as_ref());
        }
        result
    }

    fn try_start(&self) -> Result<StartOutcome> {
        let session = SessionId::new();
        let Some(previous) = self.lifecycle.begin(session) else {
            log::info!("Stream is already running");
            return Ok(StartOutcome::AlreadyStreaming);
        };

        match self.open_session(session) {
            Ok(()) => {
                log::info!("Stream session {} started", session);
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                self.lifecycle.abort(session, previous);
                Err(match e {
                    FeedError::StartupFailure(message) => FeedError::StartupFailure(message),
                    other => FeedError::StartupFailure(other.to_string()),
                })
            }
        }
    }

    fn open_session(&self, session: SessionId) -> Result<()> {
        let (accounts, filter) = {
            let watchlist = self.watchlist();
            (watchlist.accounts.clone(), watchlist.filter.clone())
        };
        if accounts.is_empty() {
            return Err(FeedError::StartupFailure(
                "no accounts to watch".to_string(),
            ));
        }

        let mut ids = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let id = self.lookup.lookup(account.handle())?;
            log::debug!("Resolved @{} to {}", account.handle(), id);
            ids.push(id);
        }
        let query = FilterQuery::follow(ids);

        let (sink, receiver) = EventSink::channel();
        let handle: Arc<dyn StreamHandle> = Arc::from(self.transport.open(&query, sink)?);

        let dispatcher = EventDispatcher {
            session,
            filter,
            extractor: self.extractor.clone(),
            consumer: self.consumer.clone(),
            lifecycle: self.lifecycle.clone(),
        };
        let spawned = std::thread::Builder::new()
            .name("linkwatch-delivery".to_string())
            .spawn(move || dispatcher.run(receiver));
        if let Err(e) = spawned {
            handle.shutdown();
            return Err(FeedError::StartupFailure(format!(
                "failed to spawn delivery thread: {}",
                e
            )));
        }

        if let Some(handle) = self.lifecycle.attach(session, handle) {
            handle.shutdown();
        }
        Ok(())
    }

    /// Close the stream from the consumer side
    ///
    /// Returns false when no stream was held. The consumer is notified
    /// through `on_disconnected` once the transport has cleaned up.
    pub fn shutdown(&self) -> bool {
        if !self.lifecycle.is_streaming() {
            return false;
        }
        if let Some(handle) = self.lifecycle.current_handle() {
            log::info!("Shutting the stream down on request");
            handle.shutdown();
        }
        true
    }

    /// A stream is held: connected, connecting or waiting to reconnect
    pub fn is_streaming(&self) -> bool {
        self.lifecycle.is_streaming()
    }

    /// Streaming and no error since the last successful connect
    ///
    /// A stream that has not reported its first connect yet also counts as
    /// connected.
    pub fn is_connected(&self) -> bool {
        self.lifecycle.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lifecycle.state()
    }
}

/// Drains one session's event channel on the delivery thread
struct EventDispatcher {
    session: SessionId,
    filter: FilterEngine,
    extractor: Arc<LinkExtractor>,
    consumer: Arc<dyn FeedConsumer>,
    lifecycle: Arc<ConnectionLifecycle>,
}

impl EventDispatcher {
    fn run(self, receiver: mpsc::Receiver<StreamEvent>) {
        log::debug!("Delivery loop for session {} started", self.session);
        let mut events_processed = 0u64;

        for event in receiver {
            events_processed += 1;
            let cleaned_up = matches!(event, StreamEvent::CleanUp);
            self.handle_event(event);
            if cleaned_up {
                break;
            }
        }

        log::debug!(
            "Delivery loop for session {} ended after {} events",
            self.session,
            events_processed
        );
    }

    fn handle_event(&self, event: StreamEvent) {
        let transition = match event {
            StreamEvent::Message(message) => {
                self.handle_message(&message);
                return;
            }
            StreamEvent::Connect => self.lifecycle.on_connect(self.session),
            StreamEvent::Disconnect => self.lifecycle.on_disconnect(self.session),
            StreamEvent::CleanUp => self.lifecycle.on_cleanup(self.session),
            StreamEvent::Error(error) => self.lifecycle.on_error(self.session, &error),
            StreamEvent::Stall(warning) => self.lifecycle.on_stall(self.session, &warning),
        };
        self.apply(transition);
    }

    fn apply(&self, transition: Transition) {
        for notification in &transition.notifications {
            notification.deliver(self.consumer.as_ref());
        }
        if let Some(handle) = transition.close {
            handle.shutdown();
        }
    }

    fn handle_message(&self, message: &StreamMessage) {
        log::debug!("Message @{} - {}", message.author, message.text);
        if !self.filter.passes(&message.text) {
            log::debug!("Message does not contain a keyword; ignoring");
            return;
        }

        let consumer = self.consumer.as_ref();
        let result = self.extractor.extract_links(&message.text, |link| {
            Notification::LinkFound(link).deliver(consumer);
        });
        match result {
            Ok(0) => log::debug!("No links in message from @{}", message.author),
            Ok(count) => log::debug!("{} link(s) in message from @{}", count, message.author),
            Err(e) => log::warn!(
                "Stopped scanning message from @{} for links: {}",
                message.author,
                e
            ),
        }
    }
}

#![allow(dead_code)]

use linkwatch::streaming::Notification;
use linkwatch::{
    AccountId, AccountLookup, EventSink, FeedConsumer, FeedError, FilterQuery, LinkUnshortener,
    Result, StreamConnectionManager, StreamEvent, StreamHandle, StreamMessage, StreamTransport,
    WatcherConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Account lookup and transport driven by the test through `emit`
pub struct ScriptedFeed {
    ids: HashMap<String, u64>,
    fail_open: AtomicBool,
    sinks: Mutex<Vec<EventSink>>,
    opened: AtomicUsize,
    shutdowns: Arc<AtomicUsize>,
    lookups: Mutex<Vec<String>>,
    last_filter: Mutex<Option<FilterQuery>>,
}

impl ScriptedFeed {
    pub fn new(accounts: &[(&str, u64)]) -> Arc<Self> {
        Arc::new(Self {
            ids: accounts
                .iter()
                .map(|(handle, id)| (handle.to_string(), *id))
                .collect(),
            fail_open: AtomicBool::new(false),
            sinks: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
            shutdowns: Arc::new(AtomicUsize::new(0)),
            lookups: Mutex::new(Vec::new()),
            last_filter: Mutex::new(None),
        })
    }

    pub fn fail_next_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    /// Push an event into the most recently opened stream
    pub fn emit(&self, event: StreamEvent) {
        let sink = self
            .sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no stream opened");
        sink.send(event);
    }

    pub fn emit_message(&self, author: &str, text: &str) {
        self.emit(StreamEvent::Message(StreamMessage::new(author, text)));
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn last_filter(&self) -> Option<FilterQuery> {
        self.last_filter.lock().unwrap().clone()
    }
}

impl AccountLookup for ScriptedFeed {
    fn lookup(&self, handle: &str) -> Result<AccountId> {
        self.lookups.lock().unwrap().push(handle.to_string());
        self.ids
            .get(handle)
            .map(|id| AccountId::new(*id))
            .ok_or_else(|| FeedError::Lookup {
                handle: handle.to_string(),
                message: "HTTP 404: User not found".to_string(),
            })
    }
}

impl StreamTransport for ScriptedFeed {
    fn open(&self, filter: &FilterQuery, sink: EventSink) -> Result<Box<dyn StreamHandle>> {
        if self.fail_open.swap(false, Ordering::SeqCst) {
            return Err(FeedError::Transport("connection refused".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last_filter.lock().unwrap() = Some(filter.clone());
        self.sinks.lock().unwrap().push(sink.clone());

        Ok(Box::new(ScriptedHandle {
            sink,
            shutdowns: self.shutdowns.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Answers the first shutdown with a cleanup event, like a real transport
struct ScriptedHandle {
    sink: EventSink,
    shutdowns: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl StreamHandle for ScriptedHandle {
    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.sink.cleaned_up();
        }
    }
}

/// Resolves links from a fixed table; unknown links fail
pub struct TableUnshortener {
    table: HashMap<String, String>,
}

impl TableUnshortener {
    pub fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            table: entries
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        })
    }
}

impl LinkUnshortener for TableUnshortener {
    fn unshorten(&self, link: &str) -> Result<String> {
        self.table
            .get(link)
            .cloned()
            .ok_or_else(|| FeedError::Unshorten {
                link: link.to_string(),
                message: "connection timed out".to_string(),
            })
    }
}

/// Forwards every callback to a channel the test reads from
pub struct RecordingConsumer {
    sender: Mutex<mpsc::Sender<Notification>>,
}

impl RecordingConsumer {
    pub fn new() -> (Arc<Self>, Recorded) {
        let (sender, receiver) = mpsc::channel();
        (
            Arc::new(Self {
                sender: Mutex::new(sender),
            }),
            Recorded { receiver },
        )
    }

    fn record(&self, notification: Notification) {
        let _ = self.sender.lock().unwrap().send(notification);
    }
}

impl FeedConsumer for RecordingConsumer {
    fn on_link_found(&self, link: &str) {
        self.record(Notification::LinkFound(link.to_string()));
    }

    fn on_connected(&self) {
        self.record(Notification::Connected);
    }

    fn on_disconnected(&self) {
        self.record(Notification::Disconnected);
    }

    fn on_status(&self, message: &str) {
        self.record(Notification::status(message));
    }
}

pub struct Recorded {
    receiver: mpsc::Receiver<Notification>,
}

impl Recorded {
    pub fn next(&self) -> Notification {
        self.receiver
            .recv_timeout(RECV_TIMEOUT)
            .expect("timed out waiting for a consumer callback")
    }

    /// Next notification, which must be a status; returns its text
    pub fn next_status(&self) -> String {
        match self.next() {
            Notification::Status(message) => message,
            other => panic!("expected a status, got {:?}", other),
        }
    }

    /// Consume the two callbacks a connect event produces
    pub fn expect_connected(&self) {
        assert_eq!(self.next_status(), "Connected to the streaming service");
        assert_eq!(self.next(), Notification::Connected);
    }

    pub fn expect_quiet(&self) {
        if let Ok(notification) = self.receiver.recv_timeout(Duration::from_millis(150)) {
            panic!("unexpected callback: {:?}", notification);
        }
    }
}

/// Poll `condition` until it holds or the receive timeout passes
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + RECV_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn manager_for(
    feed: &Arc<ScriptedFeed>,
    unshortener: Arc<dyn LinkUnshortener>,
    consumer: Arc<dyn FeedConsumer>,
) -> StreamConnectionManager {
    StreamConnectionManager::with_parts(
        feed.clone(),
        feed.clone(),
        unshortener,
        consumer,
        WatcherConfig::minimal(),
    )
    .expect("valid configuration")
}

/// Manager watching `Official_Foo`, plus the recorder for its callbacks
pub fn watching_foo() -> (Arc<ScriptedFeed>, StreamConnectionManager, Recorded) {
    let feed = ScriptedFeed::new(&[("Official_Foo", 1001)]);
    let (consumer, recorded) = RecordingConsumer::new();
    let unshortener = TableUnshortener::new(&[("https://t.co/abc123", "https://paxsite.com/badges")]);
    let manager = manager_for(&feed, unshortener, consumer);
    manager.add_account("Official_Foo").unwrap();
    (feed, manager, recorded)
}

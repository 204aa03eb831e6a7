use super::types::{StreamError, StreamEvent};
use crate::error::Result;
use crate::models::{AccountId, FilterQuery, StallWarning, StreamMessage};
use std::sync::mpsc;

/// Resolves an account handle to its numeric id
pub trait AccountLookup: Send + Sync {
    fn lookup(&self, handle: &str) -> Result<AccountId>;
}

/// Push based transport delivering stream events
///
/// `open` must return promptly; the connection itself is managed on the
/// transport's own thread, which reports everything through the sink. The
/// transport reconnects on its own after a drop and keeps doing so until the
/// handle is shut down, at which point it sends `StreamEvent::CleanUp` once.
pub trait StreamTransport: Send + Sync {
    fn open(&self, filter: &FilterQuery, sink: EventSink) -> Result<Box<dyn StreamHandle>>;
}

/// The live connection returned by `StreamTransport::open`
pub trait StreamHandle: Send + Sync {
    /// Close the stream; the transport answers with `StreamEvent::CleanUp`
    fn shutdown(&self);
}

/// Sending half of the event channel handed to a transport
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    pub fn new(sender: mpsc::Sender<StreamEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink together with the receiver that drains it
    pub fn channel() -> (Self, mpsc::Receiver<StreamEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self::new(sender), receiver)
    }

    /// Send an event; returns false once the watcher stopped listening
    pub fn send(&self, event: StreamEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(mpsc::SendError(event)) => {
                log::debug!("Dropping {:?}: event receiver is gone", event);
                false
            }
        }
    }

    pub fn message(&self, message: StreamMessage) -> bool {
        self.send(StreamEvent::Message(message))
    }

    pub fn connected(&self) -> bool {
        self.send(StreamEvent::Connect)
    }

    pub fn disconnected(&self) -> bool {
        self.send(StreamEvent::Disconnect)
    }

    pub fn cleaned_up(&self) -> bool {
        self.send(StreamEvent::CleanUp)
    }

    pub fn error(&self, error: StreamError) -> bool {
        self.send(StreamEvent::Error(error))
    }

    pub fn stalled(&self, warning: StallWarning) -> bool {
        self.send(StreamEvent::Stall(warning))
    }
}

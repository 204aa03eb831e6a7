use super::escalation::{EscalationAction, ErrorEscalationPolicy};
use super::interface::Notification;
use super::transport::StreamHandle;
use super::types::StreamError;
use crate::models::{ConnectionState, SessionId, StallWarning};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The stream that is currently open, or being opened
struct ActiveSession {
    id: SessionId,
    handle: Option<Arc<dyn StreamHandle>>,
    /// Escalation fired before the transport returned its handle
    close_requested: bool,
}

#[derive(Default)]
struct SessionState {
    session: Option<ActiveSession>,
    state: ConnectionState,
    escalation: ErrorEscalationPolicy,
}

/// Outcome of applying one transport event
#[derive(Default)]
pub struct Transition {
    pub notifications: Vec<Notification>,
    /// Handle the caller must shut down once the state lock is released
    pub close: Option<Arc<dyn StreamHandle>>,
}

impl Transition {
    fn notify(notifications: Vec<Notification>) -> Self {
        Self {
            notifications,
            close: None,
        }
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("notifications", &self.notifications)
            .field("close", &self.close.is_some())
            .finish()
    }
}

/// Connection state machine shared by the controller and the delivery thread
///
/// Idle → Connecting (start) → Connected (connect) ⇄ Disconnected
/// (disconnect / connect) → ShutDown (cleanup). The stream handle, the
/// consecutive error count and the state all sit behind one mutex, so
/// `is_streaming`/`is_connected` never observe a half applied event.
///
/// Every event carries the id of the session it belongs to; events from a
/// session that has already been cleaned up are ignored.
#[derive(Default)]
pub struct ConnectionLifecycle {
    inner: Mutex<SessionState>,
}

impl std::fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ConnectionLifecycle")
            .field("state", &inner.state)
            .field("streaming", &inner.session.is_some())
            .field("consecutive_errors", &inner.escalation.consecutive_errors())
            .finish()
    }
}

impl ConnectionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// A stream handle is held (or being opened)
    pub fn is_streaming(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Streaming and no error since the last connect
    ///
    /// A stream that has not seen its first connect yet also counts as
    /// connected.
    pub fn is_connected(&self) -> bool {
        let inner = self.lock();
        inner.session.is_some() && inner.escalation.consecutive_errors() == 0
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.lock().escalation.consecutive_errors()
    }

    /// Claim the stream slot for a new session
    ///
    /// Returns the state to restore if the start fails, or `None` when a
    /// stream is already held.
    pub(crate) fn begin(&self, id: SessionId) -> Option<ConnectionState> {
        let mut inner = self.lock();
        if inner.session.is_some() {
            return None;
        }
        let previous = inner.state;
        inner.session = Some(ActiveSession {
            id,
            handle: None,
            close_requested: false,
        });
        inner.state = ConnectionState::Connecting;
        inner.escalation.reset();
        Some(previous)
    }

    /// Store the handle returned by the transport
    ///
    /// Returns the handle back when it has to be shut down right away: either
    /// escalation already asked for a close, or the session was cleaned up
    /// before `open` returned.
    pub(crate) fn attach(
        &self,
        id: SessionId,
        handle: Arc<dyn StreamHandle>,
    ) -> Option<Arc<dyn StreamHandle>> {
        let mut inner = self.lock();
        match inner.session.as_mut() {
            Some(session) if session.id == id => {
                if session.close_requested {
                    log::debug!("Session {} was escalated while opening; closing", id);
                    return Some(handle);
                }
                session.handle = Some(handle);
                None
            }
            _ => {
                log::debug!("Session {} ended before its handle was attached", id);
                None
            }
        }
    }

    /// Release the slot claimed by `begin` after a failed start
    pub(crate) fn abort(&self, id: SessionId, previous: ConnectionState) {
        let mut inner = self.lock();
        if inner.session.as_ref().map(|s| s.id) == Some(id) {
            inner.session = None;
            inner.state = previous;
            inner.escalation.reset();
        }
    }

    /// Handle of the current session, for a consumer initiated shutdown
    pub(crate) fn current_handle(&self) -> Option<Arc<dyn StreamHandle>> {
        let mut inner = self.lock();
        let session = inner.session.as_mut()?;
        if session.handle.is_none() {
            session.close_requested = true;
        }
        session.handle.clone()
    }

    fn is_current(inner: &SessionState, id: SessionId) -> bool {
        match inner.session {
            Some(ref session) if session.id == id => true,
            _ => {
                log::debug!("Ignoring event from stale session {}", id);
                false
            }
        }
    }

    pub(crate) fn on_connect(&self, id: SessionId) -> Transition {
        let mut inner = self.lock();
        if !Self::is_current(&inner, id) {
            return Transition::default();
        }
        log::info!("Connected to the streaming service");
        inner.escalation.reset();
        inner.state = ConnectionState::Connected;
        Transition::notify(vec![
            Notification::status("Connected to the streaming service"),
            Notification::Connected,
        ])
    }

    pub(crate) fn on_disconnect(&self, id: SessionId) -> Transition {
        let mut inner = self.lock();
        if !Self::is_current(&inner, id) {
            return Transition::default();
        }
        log::info!("Disconnected from the streaming service");
        inner.state = ConnectionState::Disconnected;
        Transition::notify(vec![Notification::status(
            "Disconnected from the streaming service; reconnecting automatically",
        )])
    }

    pub(crate) fn on_cleanup(&self, id: SessionId) -> Transition {
        let mut inner = self.lock();
        if !Self::is_current(&inner, id) {
            return Transition::default();
        }
        log::info!("Stream cleaned up");
        inner.session = None;
        inner.escalation.reset();
        inner.state = ConnectionState::ShutDown;
        Transition::notify(vec![Notification::Disconnected])
    }

    pub(crate) fn on_error(&self, id: SessionId, error: &StreamError) -> Transition {
        let mut inner = self.lock();
        if !Self::is_current(&inner, id) {
            return Transition::default();
        }
        let action = inner.escalation.record_error(error);
        log::warn!(
            "Stream error #{} ({:?}): {}",
            inner.escalation.consecutive_errors(),
            error.kind,
            error
        );

        match action {
            EscalationAction::Absorb => Transition::default(),
            EscalationAction::Warn(message) => {
                Transition::notify(vec![Notification::Status(message)])
            }
            EscalationAction::HardStop(message) => {
                log::error!("Error threshold reached, shutting the stream down");
                let close = match inner.session.as_mut() {
                    Some(session) => {
                        if session.handle.is_none() {
                            session.close_requested = true;
                        }
                        session.handle.clone()
                    }
                    None => None,
                };
                Transition {
                    notifications: vec![Notification::Status(message)],
                    close,
                }
            }
        }
    }

    pub(crate) fn on_stall(&self, id: SessionId, warning: &StallWarning) -> Transition {
        let inner = self.lock();
        if !Self::is_current(&inner, id) {
            return Transition::default();
        }
        log::warn!("Stall warning: {}", warning);
        Transition::notify(vec![Notification::Status(format!(
            "Feed stalled ({}). The stream may have died even if it still reports \
             connected; restarting is recommended.",
            warning
        ))])
    }
}

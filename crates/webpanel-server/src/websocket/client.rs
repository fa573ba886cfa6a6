//! Per-connection session state: identity, lifecycle, and the outbound queue.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Unique session identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh, time-ordered ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess_{}", self.0)
    }
}

/// Session lifecycle. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Created, waiting for the hub to admit it.
    Registering = 0,
    /// Admitted; receives broadcasts.
    Active = 1,
    /// Outbound queue closed; loops are winding down.
    Closing = 2,
    /// Both loops have exited.
    Closed = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Registering,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Result of a non-blocking enqueue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enqueue {
    /// Message is queued for the send loop.
    Queued,
    /// Queue is at capacity; the consumer is not keeping up.
    Full,
    /// Queue is closed; the session is going away.
    Closed,
}

/// One live client connection as seen by the hub and the router.
///
/// The outbound queue has a single sender, held here. Closing the queue drops
/// that sender, so the send loop drains what is buffered and then observes the
/// end of the channel.
pub struct ClientSession {
    id: SessionId,
    state: AtomicU8,
    outbound: Mutex<Option<mpsc::Sender<Arc<String>>>>,
    connected_at: Instant,
}

impl ClientSession {
    /// Create a session and the receiving end of its outbound queue.
    pub fn new(id: SessionId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let session = Arc::new(Self {
            id,
            state: AtomicU8::new(SessionState::Registering as u8),
            outbound: Mutex::new(Some(tx)),
            connected_at: Instant::now(),
        });
        (session, rx)
    }

    /// Session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// How long ago the connection was accepted.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// `Registering -> Active`. Returns `false` if the session already started closing.
    pub(crate) fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Registering as u8,
                SessionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Try to queue an encoded message without waiting.
    ///
    /// The lock only covers `try_send`, which never blocks.
    pub fn enqueue(&self, message: Arc<String>) -> Enqueue {
        let guard = self.outbound.lock();
        let Some(tx) = guard.as_ref() else {
            return Enqueue::Closed;
        };
        match tx.try_send(message) {
            Ok(()) => Enqueue::Queued,
            Err(TrySendError::Full(_)) => Enqueue::Full,
            Err(TrySendError::Closed(_)) => Enqueue::Closed,
        }
    }

    /// Close the outbound queue and move to `Closing`. Idempotent.
    pub fn close(&self) {
        drop(self.outbound.lock().take());
        let _ = self
            .state
            .fetch_max(SessionState::Closing as u8, Ordering::AcqRel);
    }

    /// Whether the outbound queue has been closed.
    pub fn is_closing(&self) -> bool {
        self.outbound.lock().is_none()
    }

    /// Terminal transition once both loops are done.
    pub(crate) fn mark_closed(&self) {
        self.close();
        self.state
            .store(SessionState::Closed as u8, Ordering::Release);
    }
}

impl fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(capacity: usize) -> (Arc<ClientSession>, mpsc::Receiver<Arc<String>>) {
        ClientSession::new(SessionId::new(), capacity)
    }

    fn msg(s: &str) -> Arc<String> {
        Arc::new(s.to_string())
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("sess_"));
    }

    #[test]
    fn starts_registering() {
        let (session, _rx) = make_session(4);
        assert_eq!(session.state(), SessionState::Registering);
        assert!(!session.is_closing());
    }

    #[test]
    fn activate_only_from_registering() {
        let (session, _rx) = make_session(4);
        assert!(session.activate());
        assert_eq!(session.state(), SessionState::Active);
        assert!(!session.activate());
    }

    #[test]
    fn activate_fails_after_close() {
        let (session, _rx) = make_session(4);
        session.close();
        assert!(!session.activate());
        assert_eq!(session.state(), SessionState::Closing);
    }

    #[test]
    fn enqueue_until_full() {
        let (session, mut rx) = make_session(2);
        assert_eq!(session.enqueue(msg("a")), Enqueue::Queued);
        assert_eq!(session.enqueue(msg("b")), Enqueue::Queued);
        assert_eq!(session.enqueue(msg("c")), Enqueue::Full);

        assert_eq!(rx.try_recv().unwrap().as_str(), "a");
        assert_eq!(session.enqueue(msg("d")), Enqueue::Queued);
    }

    #[test]
    fn enqueue_after_close_reports_closed() {
        let (session, _rx) = make_session(2);
        session.close();
        assert!(session.is_closing());
        assert_eq!(session.enqueue(msg("a")), Enqueue::Closed);
    }

    #[test]
    fn enqueue_after_receiver_dropped_reports_closed() {
        let (session, rx) = make_session(2);
        drop(rx);
        assert_eq!(session.enqueue(msg("a")), Enqueue::Closed);
    }

    #[tokio::test]
    async fn close_drains_then_ends_channel() {
        let (session, mut rx) = make_session(4);
        let _ = session.enqueue(msg("last"));
        session.close();

        assert_eq!(rx.recv().await.unwrap().as_str(), "last");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let (session, _rx) = make_session(4);
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closing);
    }

    #[test]
    fn mark_closed_is_terminal() {
        let (session, _rx) = make_session(4);
        assert!(session.activate());
        session.mark_closed();
        assert_eq!(session.state(), SessionState::Closed);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }
}

//! The hub: sole owner of the set of live sessions.
//!
//! Registration, deregistration, and broadcast arrive on three bounded
//! channels and are applied one at a time by [`HubLoop::run`]. Nothing else
//! touches the session map, so a broadcast never races a membership change.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::client::{ClientSession, Enqueue, SessionId};
use super::envelope::Envelope;
use crate::metrics::{HUB_BROADCASTS_TOTAL, WS_CONNECTIONS_ACTIVE, WS_EVICTIONS_TOTAL};

/// Cloneable handle used to talk to the hub loop.
#[derive(Clone)]
pub struct Hub {
    register_tx: mpsc::Sender<Arc<ClientSession>>,
    unregister_tx: mpsc::Sender<Arc<ClientSession>>,
    broadcast_tx: mpsc::Sender<Arc<String>>,
    active: Arc<AtomicUsize>,
}

/// The control loop half of a hub. Run it on its own task.
pub struct HubLoop {
    register_rx: mpsc::Receiver<Arc<ClientSession>>,
    unregister_rx: mpsc::Receiver<Arc<ClientSession>>,
    broadcast_rx: mpsc::Receiver<Arc<String>>,
    sessions: HashMap<SessionId, Arc<ClientSession>>,
    active: Arc<AtomicUsize>,
}

impl Hub {
    /// Create a hub handle and its control loop.
    pub fn new(channel_capacity: usize) -> (Self, HubLoop) {
        let (register_tx, register_rx) = mpsc::channel(channel_capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(channel_capacity);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(channel_capacity);
        let active = Arc::new(AtomicUsize::new(0));

        let hub = Self {
            register_tx,
            unregister_tx,
            broadcast_tx,
            active: Arc::clone(&active),
        };
        let control = HubLoop {
            register_rx,
            unregister_rx,
            broadcast_rx,
            sessions: HashMap::new(),
            active,
        };
        (hub, control)
    }

    /// Create a hub and spawn its control loop on the current runtime.
    ///
    /// The loop exits once every `Hub` handle has been dropped.
    pub fn spawn(channel_capacity: usize) -> Self {
        let (hub, control) = Self::new(channel_capacity);
        drop(tokio::spawn(control.run()));
        hub
    }

    /// Admit a session. Callers register each session exactly once.
    pub async fn register(&self, session: Arc<ClientSession>) {
        if self.register_tx.send(session).await.is_err() {
            warn!("hub loop has stopped, register dropped");
        }
    }

    /// Remove a session and close its queue. A no-op if it is not present.
    pub async fn unregister(&self, session: Arc<ClientSession>) {
        if let Err(mpsc::error::SendError(session)) = self.unregister_tx.send(session).await {
            session.close();
        }
    }

    /// Encode once and fan out to every active session.
    pub async fn broadcast(&self, envelope: &Envelope) {
        let encoded = match envelope.encode() {
            Ok(e) => e,
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "failed to encode broadcast");
                return;
            }
        };
        if self.broadcast_tx.send(encoded).await.is_err() {
            warn!(kind = %envelope.kind, "hub loop has stopped, broadcast dropped");
        }
    }

    /// Number of sessions in the active set, as of the last processed event.
    pub fn session_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl HubLoop {
    /// Process events until every hub handle is gone.
    ///
    /// Registrations are polled first so an unregister sent after a register
    /// by the same task is never seen before it. A broadcast waits while
    /// registrations or unregistrations are pending, so a sustained connect
    /// storm delays fan-out; it is bounded by the accept rate.
    pub async fn run(mut self) {
        info!("hub started");
        loop {
            tokio::select! {
                biased;
                Some(session) = self.register_rx.recv() => self.on_register(session),
                Some(session) = self.unregister_rx.recv() => self.on_unregister(&session),
                Some(message) = self.broadcast_rx.recv() => self.on_broadcast(&message),
                else => break,
            }
        }
        for session in self.sessions.values() {
            session.close();
        }
        self.sessions.clear();
        self.publish_count();
        info!("hub stopped");
    }

    fn on_register(&mut self, session: Arc<ClientSession>) {
        if !session.activate() {
            debug!(session_id = %session.id(), "session closed before admission");
            return;
        }
        let id = session.id();
        if self.sessions.insert(id, session).is_some() {
            warn!(session_id = %id, "session registered twice");
        }
        self.publish_count();
        debug!(session_id = %id, active = self.sessions.len(), "session registered");
    }

    fn on_unregister(&mut self, session: &Arc<ClientSession>) {
        session.close();
        if self.sessions.remove(&session.id()).is_some() {
            self.publish_count();
            debug!(session_id = %session.id(), active = self.sessions.len(), "session unregistered");
        }
    }

    fn on_broadcast(&mut self, message: &Arc<String>) {
        counter!(HUB_BROADCASTS_TOTAL).increment(1);
        let mut gone = Vec::new();
        let mut recipients = 0usize;

        for (id, session) in &self.sessions {
            match session.enqueue(Arc::clone(message)) {
                Enqueue::Queued => recipients += 1,
                Enqueue::Full => {
                    warn!(session_id = %id, "outbound queue full, evicting slow client");
                    counter!(WS_EVICTIONS_TOTAL).increment(1);
                    session.close();
                    gone.push(*id);
                }
                Enqueue::Closed => gone.push(*id),
            }
        }

        for id in &gone {
            let _ = self.sessions.remove(id);
        }
        if !gone.is_empty() {
            self.publish_count();
        }
        debug!(recipients, removed = gone.len(), "broadcast delivered");
    }

    #[allow(clippy::cast_precision_loss)]
    fn publish_count(&self) {
        let n = self.sessions.len();
        self.active.store(n, Ordering::Release);
        gauge!(WS_CONNECTIONS_ACTIVE).set(n as f64);
    }
}

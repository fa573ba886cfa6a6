//! Live-update channel: hub, client sessions, routing, and periodic broadcast.

pub mod broadcaster;
pub mod client;
pub mod envelope;
pub mod hub;
pub mod router;
pub mod session;

pub use broadcaster::PeriodicBroadcaster;
pub use client::{ClientSession, Enqueue, SessionId, SessionState};
pub use envelope::Envelope;
pub use hub::{Hub, HubLoop};
pub use router::{Dispatch, MessageRouter};
pub use session::{SessionConfig, run_session};

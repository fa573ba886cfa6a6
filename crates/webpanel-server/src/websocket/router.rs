//! Inbound message dispatch.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::client::{ClientSession, Enqueue};
use super::envelope::{CAMERA_STATUS, Envelope, InboundKind, SYSTEM_INFO};
use super::hub::Hub;
use crate::recording::RecordingState;
use crate::stats::StatsProvider;

/// What happened to an inbound frame.
#[derive(Debug)]
pub enum Dispatch {
    /// Answered inline.
    Replied,
    /// Handed to a task that will reply when its data is ready.
    Spawned(JoinHandle<()>),
    /// Malformed or unrecognized; nothing is sent back.
    Ignored,
}

/// Routes inbound envelopes to the producers that answer them.
#[derive(Clone)]
pub struct MessageRouter {
    hub: Hub,
    stats: Arc<dyn StatsProvider>,
    recording: Arc<dyn RecordingState>,
}

impl MessageRouter {
    /// Create a router.
    pub fn new(hub: Hub, stats: Arc<dyn StatsProvider>, recording: Arc<dyn RecordingState>) -> Self {
        Self {
            hub,
            stats,
            recording,
        }
    }

    /// Dispatch one text frame from `session`.
    ///
    /// Heartbeats are answered before returning; snapshot requests run on their
    /// own task so a slow collaborator never stalls the receive loop.
    pub async fn dispatch(&self, session: &Arc<ClientSession>, text: &str) -> Dispatch {
        let envelope = match Envelope::decode(text) {
            Ok(env) => env,
            Err(e) => {
                debug!(session_id = %session.id(), error = %e, "ignoring malformed message");
                return Dispatch::Ignored;
            }
        };

        match envelope.inbound_kind() {
            InboundKind::Ping => {
                reply(&self.hub, session, &Envelope::pong(envelope.data)).await;
                Dispatch::Replied
            }
            InboundKind::GetSystemInfo => {
                let stats = Arc::clone(&self.stats);
                Dispatch::Spawned(self.spawn_reply(session, SYSTEM_INFO, async move {
                    stats.snapshot().await.map_err(|e| e.to_string())
                }))
            }
            InboundKind::GetCameraStatus => {
                let recording = Arc::clone(&self.recording);
                Dispatch::Spawned(self.spawn_reply(session, CAMERA_STATUS, async move {
                    recording.status().await.map_err(|e| e.to_string())
                }))
            }
            InboundKind::Unknown => {
                debug!(session_id = %session.id(), kind = %envelope.kind, "ignoring unknown message type");
                Dispatch::Ignored
            }
        }
    }

    fn spawn_reply<T, F>(&self, session: &Arc<ClientSession>, kind: &'static str, fetch: F) -> JoinHandle<()>
    where
        T: Serialize + Send + 'static,
        F: Future<Output = Result<T, String>> + Send + 'static,
    {
        let hub = self.hub.clone();
        let session = Arc::clone(session);
        tokio::spawn(async move {
            if session.is_closing() {
                return;
            }
            let payload = match fetch.await {
                Ok(p) => p,
                Err(error) => {
                    warn!(session_id = %session.id(), kind, %error, "collaborator failed, no reply sent");
                    return;
                }
            };
            match Envelope::with_payload(kind, &payload) {
                Ok(env) => reply(&hub, &session, &env).await,
                Err(e) => warn!(session_id = %session.id(), kind, error = %e, "failed to encode reply"),
            }
        })
    }
}

/// Queue a reply for one session.
///
/// A full queue means the client stopped reading: the session is closed and
/// handed to the hub for removal. A closed queue means the session is already
/// gone and the reply is dropped.
async fn reply(hub: &Hub, session: &Arc<ClientSession>, envelope: &Envelope) {
    let encoded = match envelope.encode() {
        Ok(e) => e,
        Err(e) => {
            warn!(session_id = %session.id(), kind = %envelope.kind, error = %e, "failed to encode reply");
            return;
        }
    };
    match session.enqueue(encoded) {
        Enqueue::Queued => {}
        Enqueue::Full => {
            warn!(session_id = %session.id(), kind = %envelope.kind, "outbound queue full on reply, closing");
            session.close();
            hub.unregister(Arc::clone(session)).await;
        }
        Enqueue::Closed => {
            debug!(session_id = %session.id(), kind = %envelope.kind, "session closed, reply dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{CameraStatus, RecordingError, RecordingStarted, RecordingStopped};
    use crate::stats::{StatsError, SystemInfo};
    use crate::websocket::client::SessionId;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct FixedStats;

    #[async_trait]
    impl StatsProvider for FixedStats {
        async fn snapshot(&self) -> Result<SystemInfo, StatsError> {
            Ok(SystemInfo {
                cpu_usage: 10.0,
                memory_usage: 20.0,
                disk_usage: 30.0,
                uptime: "1h 2m".into(),
                timestamp: 42,
            })
        }
    }

    struct FailingStats;

    #[async_trait]
    impl StatsProvider for FailingStats {
        async fn snapshot(&self) -> Result<SystemInfo, StatsError> {
            Err(StatsError::Unavailable("no /proc".into()))
        }
    }

    struct IdleRecorder;

    #[async_trait]
    impl RecordingState for IdleRecorder {
        async fn status(&self) -> Result<CameraStatus, RecordingError> {
            Ok(CameraStatus {
                recording: false,
                filename: String::new(),
                start_time: String::new(),
                duration: 0,
                camera_ip: "10.0.0.9:8080".into(),
            })
        }
        async fn start(&self) -> Result<RecordingStarted, RecordingError> {
            Err(RecordingError::AlreadyRecording)
        }
        async fn stop(&self) -> Result<RecordingStopped, RecordingError> {
            Err(RecordingError::NotRecording)
        }
    }

    fn make_router(stats: Arc<dyn StatsProvider>) -> MessageRouter {
        MessageRouter::new(Hub::spawn(8), stats, Arc::new(IdleRecorder))
    }

    fn make_session(capacity: usize) -> (Arc<ClientSession>, mpsc::Receiver<Arc<String>>) {
        ClientSession::new(SessionId::new(), capacity)
    }

    async fn next(rx: &mut mpsc::Receiver<Arc<String>>) -> (String, Value) {
        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let env = Envelope::decode(&msg).unwrap();
        (env.kind, env.data)
    }

    #[tokio::test]
    async fn ping_gets_pong_with_same_data() {
        let router = make_router(Arc::new(FixedStats));
        let (session, mut rx) = make_session(4);

        let outcome = router.dispatch(&session, r#"{"type":"ping","data":"x"}"#).await;
        assert!(matches!(outcome, Dispatch::Replied));
        assert_eq!(next(&mut rx).await, ("pong".into(), json!("x")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn system_info_request_answered_async() {
        let router = make_router(Arc::new(FixedStats));
        let (session, mut rx) = make_session(4);

        let Dispatch::Spawned(task) = router.dispatch(&session, r#"{"type":"get_system_info"}"#).await else {
            panic!("expected spawned reply");
        };
        task.await.unwrap();

        let (kind, data) = next(&mut rx).await;
        assert_eq!(kind, "system_info");
        assert_eq!(data["cpu_usage"], 10.0);
        assert_eq!(data["uptime"], "1h 2m");
        assert_eq!(data["timestamp"], 42);
    }

    #[tokio::test]
    async fn camera_status_request_answered_async() {
        let router = make_router(Arc::new(FixedStats));
        let (session, mut rx) = make_session(4);

        let Dispatch::Spawned(task) = router.dispatch(&session, r#"{"type":"get_camera_status","data":{}}"#).await else {
            panic!("expected spawned reply");
        };
        task.await.unwrap();

        let (kind, data) = next(&mut rx).await;
        assert_eq!(kind, "camera_status");
        assert_eq!(data["recording"], false);
        assert_eq!(data["duration"], 0);
        assert_eq!(data["camera_ip"], "10.0.0.9:8080");
    }

    #[tokio::test]
    async fn failing_provider_sends_nothing() {
        let router = make_router(Arc::new(FailingStats));
        let (session, mut rx) = make_session(4);

        let Dispatch::Spawned(task) = router.dispatch(&session, r#"{"type":"get_system_info"}"#).await else {
            panic!("expected spawned reply");
        };
        task.await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_and_unknown_are_ignored() {
        let router = make_router(Arc::new(FixedStats));
        let (session, mut rx) = make_session(4);

        for text in ["not json", r#"{"data":1}"#, r#"{"type":"reboot","data":null}"#, ""] {
            assert!(matches!(router.dispatch(&session, text).await, Dispatch::Ignored));
        }
        assert!(rx.try_recv().is_err());
        assert!(!session.is_closing());
    }

    #[tokio::test]
    async fn reply_to_closed_session_is_dropped() {
        let router = make_router(Arc::new(FixedStats));
        let (session, mut rx) = make_session(4);
        session.close();

        let _ = router.dispatch(&session, r#"{"type":"ping","data":1}"#).await;
        if let Dispatch::Spawned(task) = router.dispatch(&session, r#"{"type":"get_system_info"}"#).await {
            task.await.unwrap();
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn reply_to_full_queue_closes_session() {
        let router = make_router(Arc::new(FixedStats));
        let (session, _rx) = make_session(1);

        let _ = router.dispatch(&session, r#"{"type":"ping","data":1}"#).await;
        assert!(!session.is_closing());
        let _ = router.dispatch(&session, r#"{"type":"ping","data":2}"#).await;
        assert!(session.is_closing());
    }
}

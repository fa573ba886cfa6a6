//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::client::{ClientSession, SessionId};
use super::hub::Hub;
use super::router::MessageRouter;
use crate::config::ServerConfig;
use crate::metrics::{WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// Per-connection timing and queue settings.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Outbound queue capacity.
    pub send_queue_capacity: usize,
    /// Rolling read deadline.
    pub read_timeout: Duration,
    /// Deadline for each write.
    pub write_timeout: Duration,
    /// Send-loop idle time before a ping frame.
    pub ping_interval: Duration,
}

impl From<&ServerConfig> for SessionConfig {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            send_queue_capacity: cfg.send_queue_capacity,
            read_timeout: cfg.read_timeout,
            write_timeout: cfg.write_timeout,
            ping_interval: cfg.ping_interval,
        }
    }
}

/// Why the receive loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveExit {
    /// Peer sent a close frame or the stream ended.
    PeerClosed,
    /// Nothing arrived within the read deadline.
    TimedOut,
    /// Transport or protocol error (including oversized frames).
    Error,
}

/// Why the send loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendExit {
    /// The outbound queue was closed; a close frame was sent.
    QueueClosed,
    /// A write failed or missed its deadline.
    WriteFailed,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers a new [`ClientSession`] with the hub
/// 2. Spawns the send loop (queue drain, write deadline, idle pings)
/// 3. Runs the receive loop until close, error, or read timeout, or until the
///    send loop ends first (eviction, failed write)
/// 4. Unregisters, waits for the send loop, drops the socket, and marks the
///    session closed
#[instrument(skip_all, fields(session_id = %id))]
pub async fn run_session(
    socket: WebSocket,
    id: SessionId,
    hub: Hub,
    router: MessageRouter,
    config: SessionConfig,
) {
    let (session, outbound_rx) = ClientSession::new(id, config.send_queue_capacity);
    let (ws_tx, mut ws_rx) = socket.split();

    let connected = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    hub.register(Arc::clone(&session)).await;

    let sender_session = Arc::clone(&session);
    let mut send_task = tokio::spawn(async move {
        let exit = send_loop(ws_tx, outbound_rx, config.write_timeout, config.ping_interval).await;
        if exit == SendExit::WriteFailed {
            sender_session.close();
        }
        exit
    });

    // Either loop ending ends the session; the socket is dropped below.
    let (recv_exit, joined) = tokio::select! {
        exit = receive_loop(&mut ws_rx, &session, &router, config.read_timeout) => (Some(exit), None),
        joined = &mut send_task => (None, Some(joined)),
    };

    hub.unregister(Arc::clone(&session)).await;
    let send_exit = match joined {
        Some(joined) => joined.ok(),
        None => send_task.await.ok(),
    };
    drop(ws_rx);
    session.mark_closed();

    info!(?recv_exit, ?send_exit, "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connected.elapsed().as_secs_f64());
}

/// Read frames until the connection ends or goes quiet.
///
/// Every frame, pongs included, refreshes the deadline.
async fn receive_loop<S>(
    ws_rx: &mut S,
    session: &Arc<ClientSession>,
    router: &MessageRouter,
    read_timeout: Duration,
) -> ReceiveExit
where
    S: futures::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let frame = match tokio::time::timeout(read_timeout, ws_rx.next()).await {
            Err(_) => {
                warn!(timeout_ms = read_timeout.as_millis(), "read deadline expired");
                return ReceiveExit::TimedOut;
            }
            Ok(None) => return ReceiveExit::PeerClosed,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "read failed");
                return ReceiveExit::Error;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => {
                let _ = router.dispatch(session, text.as_str()).await;
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    let _ = router.dispatch(session, text).await;
                }
                Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
            },
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                debug!("client sent close frame");
                return ReceiveExit::PeerClosed;
            }
        }
    }
}

/// Drain the outbound queue into the socket.
///
/// Sends a ping after `ping_interval` with no writes. When the queue closes,
/// sends a close frame and returns. The sink is closed on every exit path.
async fn send_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<String>>,
    write_timeout: Duration,
    ping_interval: Duration,
) -> SendExit {
    let idle = tokio::time::sleep(ping_interval);
    tokio::pin!(idle);

    let exit = loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(text) = msg else {
                    let _ = write_frame(&mut ws_tx, Message::Close(None), write_timeout).await;
                    break SendExit::QueueClosed;
                };
                if !write_frame(&mut ws_tx, Message::Text(text.as_str().into()), write_timeout).await {
                    break SendExit::WriteFailed;
                }
            }
            () = &mut idle => {
                if !write_frame(&mut ws_tx, Message::Ping(vec![].into()), write_timeout).await {
                    break SendExit::WriteFailed;
                }
            }
        }
        idle.as_mut().reset(tokio::time::Instant::now() + ping_interval);
    };

    let _ = tokio::time::timeout(write_timeout, ws_tx.close()).await;
    exit
}

async fn write_frame(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    write_timeout: Duration,
) -> bool {
    match tokio::time::timeout(write_timeout, ws_tx.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "write failed");
            false
        }
        Err(_) => {
            warn!(timeout_ms = write_timeout.as_millis(), "write deadline expired");
            false
        }
    }
}

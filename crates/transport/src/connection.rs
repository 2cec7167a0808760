//! WebSocket connection manager
//!
//! Owns the live socket and its reader/writer tasks. The session layer
//! drives reconnection: on an unexpected close the manager reports
//! `Closed { manual: false }` and hands out the next backoff delay; the
//! session layer sleeps and calls `connect` again with a fresh setup
//! message. A manual disconnect is terminal and idempotent.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::backoff::ReconnectPolicy;
use crate::protocol::{ClientMessage, ServerEvent};
use crate::TransportError;

/// Lifecycle of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Attempt budget exhausted; only a fresh session leaves this state
    Failed,
}

/// What the session layer sees from the link
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A parsed server event
    Inbound(ServerEvent),
    /// The socket closed; `manual` distinguishes an operator stop from a
    /// drop that should trigger recovery
    Closed { manual: bool },
}

struct LinkHandle {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl LinkHandle {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Connection owner
///
/// The pieces the socket tasks touch (state, close flag, event sender) are
/// individually shared so the manager itself needs no wrapping.
pub struct ConnectionManager {
    ws_url: String,
    connect_timeout: Duration,
    policy: ReconnectPolicy,
    state: Arc<Mutex<ConnectionState>>,
    events: mpsc::UnboundedSender<LinkEvent>,
    link: Mutex<Option<LinkHandle>>,
    manual_close: Arc<AtomicBool>,
    attempts: AtomicU32,
}

impl ConnectionManager {
    pub fn new(
        ws_url: impl Into<String>,
        connect_timeout: Duration,
        policy: ReconnectPolicy,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            connect_timeout,
            policy,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            events,
            link: Mutex::new(None),
            manual_close: Arc::new(AtomicBool::new(false)),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    /// Number of consecutive failed attempts so far
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Open the socket and send the setup message
    ///
    /// A connect already in flight, or an open link, makes this a no-op.
    /// The handshake races a hard timeout so a socket stuck in connecting
    /// cannot wedge the session.
    pub async fn connect(&self, setup: ClientMessage) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Connected | ConnectionState::Connecting => return Ok(()),
                _ => *state = ConnectionState::Connecting,
            }
        }
        self.teardown_link();
        self.manual_close.store(false, Ordering::SeqCst);

        tracing::info!(url = %self.ws_url, "connecting");
        let connect = connect_async(&self.ws_url);
        let (stream, _response) = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(ok)) => ok,
            Ok(Err(e)) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(TransportError::WebSocket(e));
            }
            Err(_) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(TransportError::ConnectTimeout(self.connect_timeout));
            }
        };

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("failed to serialize outbound message: {e}");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!("websocket send failed: {e}");
                    break;
                }
            }
        });

        let events = self.events.clone();
        let state = Arc::clone(&self.state);
        let manual_close = Arc::clone(&self.manual_close);
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            let _ = events.send(LinkEvent::Inbound(event));
                        }
                        Err(e) => {
                            tracing::warn!("unparseable server event: {e}");
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("websocket read failed: {e}");
                        break;
                    }
                }
            }
            if !manual_close.load(Ordering::SeqCst) {
                tracing::warn!("connection dropped");
                *state.lock() = ConnectionState::Disconnected;
                let _ = events.send(LinkEvent::Closed { manual: false });
            }
        });

        outbound
            .send(setup)
            .map_err(|_| TransportError::NotConnected)?;

        *self.link.lock() = Some(LinkHandle {
            outbound,
            reader,
            writer,
        });
        self.attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        tracing::info!("connected");
        Ok(())
    }

    /// Queue a message on the open link
    pub fn send(&self, msg: ClientMessage) -> Result<(), TransportError> {
        let link = self.link.lock();
        let handle = link.as_ref().ok_or(TransportError::NotConnected)?;
        handle
            .outbound
            .send(msg)
            .map_err(|_| TransportError::NotConnected)
    }

    /// Operator-initiated stop; safe to call repeatedly and from any state
    pub fn disconnect(&self) {
        if self.manual_close.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("disconnecting");
        self.teardown_link();
        self.set_state(ConnectionState::Disconnected);
        let _ = self.events.send(LinkEvent::Closed { manual: true });
    }

    /// Consume one attempt from the budget and return the backoff delay,
    /// or `None` (entering `Failed`) when the budget is spent
    pub fn next_retry_delay(&self) -> Option<Duration> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.policy.delay_for(attempt, &mut rand::thread_rng()) {
            Some(delay) => {
                self.set_state(ConnectionState::Reconnecting);
                tracing::info!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
                Some(delay)
            }
            None => {
                tracing::error!(
                    attempts = self.policy.max_attempts(),
                    "reconnect budget exhausted"
                );
                self.set_state(ConnectionState::Failed);
                None
            }
        }
    }

    fn teardown_link(&self) {
        if let Some(link) = self.link.lock().take() {
            link.abort();
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.teardown_link();
    }
}

//! Device session sync client
//!
//! Keeps one WebSocket open to the session fanout endpoint and feeds every
//! inbound control message through [`dispatch`]. A single background task
//! owns the socket and the [`Connection`] state machine, so socket events,
//! the reconnect timer and shutdown are handled one at a time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::connection::{
    Connection, ConnectionSnapshot, ConnectionState, DisconnectReason, Transition,
};
use super::dispatch::dispatch;
use super::message::InboundMessage;
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::store::SessionStore;

/// Upper bound on a single WebSocket handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on sending the close frame during shutdown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Real-time session sync client
///
/// Constructing a client starts a connection attempt when a token is
/// stored. Without a token the client is inert: it stays `Idle` and never
/// retries on its own.
///
/// Dropping the client stops its background task; [`shutdown`] does the
/// same and waits until the socket is closed.
///
/// [`shutdown`]: DeviceSyncClient::shutdown
pub struct DeviceSyncClient {
    status: Arc<watch::Sender<ConnectionSnapshot>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    inert: bool,
}

impl DeviceSyncClient {
    /// Create a client and, if a token is stored, start connecting
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &Config,
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let connection = Connection::new(config.reconnect_policy());
        let status = Arc::new(watch::channel(connection.snapshot()).0);

        if resolve_token(credentials.as_ref(), &config.token_key).is_none() {
            info!("No stored token, sync client stays idle");
            return Self {
                status,
                shutdown_tx: Mutex::new(None),
                task: Mutex::new(None),
                inert: true,
            };
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = Worker {
            config: config.clone(),
            credentials,
            store,
            connection,
            status: status.clone(),
            shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        Self {
            status,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            task: Mutex::new(Some(task)),
            inert: false,
        }
    }

    /// Current connection state and attempt count
    pub fn status(&self) -> ConnectionSnapshot {
        *self.status.borrow()
    }

    /// Subscribe to connection state changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.status.subscribe()
    }

    /// True if the client was created without a token
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// True while the background task is alive (connecting, connected or
    /// waiting to reconnect)
    pub fn is_active(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the client
    ///
    /// Cancels a pending reconnect timer and closes the socket before
    /// returning. Calling it more than once is a no-op.
    pub async fn shutdown(&self) {
        if let Some(tx) = lock(&self.shutdown_tx).take() {
            let _ = tx.send(());
        }

        let task = lock(&self.task).take();
        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    warn!("Sync task ended abnormally: {}", e);
                }
            }
            None if self.inert => {
                self.status.send_replace(ConnectionSnapshot {
                    state: ConnectionState::Disconnected(DisconnectReason::Shutdown),
                    attempts: 0,
                });
            }
            None => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Look up a non-empty token; read errors count as absent
fn resolve_token(credentials: &dyn CredentialStore, key: &str) -> Option<String> {
    match credentials.get(key) {
        Ok(token) => token.filter(|t| !t.is_empty()),
        Err(e) => {
            warn!("Failed to read token: {}", e);
            None
        }
    }
}

/// How one socket session ended
enum SessionEnd {
    Shutdown,
    Lost(String),
}

/// Background task state; owns the socket for its whole life
struct Worker {
    config: Config,
    credentials: Arc<dyn CredentialStore>,
    store: Arc<dyn SessionStore>,
    connection: Connection,
    status: Arc<watch::Sender<ConnectionSnapshot>>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl Worker {
    /// Connect, reconnect with backoff, stop on shutdown or exhaustion
    async fn run(mut self) {
        loop {
            // Token is read on every attempt; a forced logout removes it
            let Some(token) = resolve_token(self.credentials.as_ref(), &self.config.token_key)
            else {
                warn!("Token no longer available, sync stopped");
                self.connection.abandon();
                self.publish();
                return;
            };

            if !self.connection.begin_connect() {
                return;
            }
            self.publish();

            match self.run_session(&token).await {
                SessionEnd::Shutdown => {
                    self.stop();
                    return;
                }
                SessionEnd::Lost(reason) => {
                    warn!("Sync connection lost: {}", reason);
                }
            }

            match self.connection.lost() {
                Transition::ScheduleReconnect {
                    attempt,
                    delay,
                    generation,
                } => {
                    self.publish();
                    info!(
                        "Reconnecting in {}ms (attempt {}/{})",
                        delay.as_millis(),
                        attempt,
                        self.connection.policy().max_attempts()
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            if !self.connection.timer_fired(generation) {
                                debug!("Ignoring stale reconnect timer");
                                return;
                            }
                        }
                        _ = &mut self.shutdown_rx => {
                            self.stop();
                            return;
                        }
                    }
                }
                Transition::GiveUp => {
                    warn!(
                        "Giving up after {} reconnect attempts",
                        self.connection.attempts()
                    );
                    self.publish();
                    return;
                }
                Transition::Ignored => return,
            }
        }
    }

    /// Run one socket from handshake to close
    async fn run_session(&mut self, token: &str) -> SessionEnd {
        let url = self.config.websocket_url(token);
        debug!("Connecting to {}", self.config.server_url);

        let handshake = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url));
        let ws_stream = tokio::select! {
            result = handshake => match result {
                Ok(Ok((stream, _response))) => stream,
                Ok(Err(e)) => return SessionEnd::Lost(format!("connect failed: {}", e)),
                Err(_) => return SessionEnd::Lost("connect timed out".to_string()),
            },
            _ = &mut self.shutdown_rx => return SessionEnd::Shutdown,
        };

        self.connection.opened();
        self.publish();
        info!("Connected to {}", self.config.server_url);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => {
                    if !close_within(&mut write, CLOSE_TIMEOUT).await {
                        warn!("Timed out sending close frame, dropping socket");
                    }
                    return SessionEnd::Shutdown;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                            Ok(text) => self.handle_frame(&text),
                            Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                        },
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| format!("server closed ({})", u16::from(f.code)))
                                .unwrap_or_else(|| "server closed".to_string());
                            return SessionEnd::Lost(reason);
                        }
                        Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                        None => return SessionEnd::Lost("stream ended".to_string()),
                        // Ping/pong handled by tungstenite
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    /// Decode and dispatch one frame; malformed frames are dropped
    fn handle_frame(&self, text: &str) {
        match InboundMessage::decode(text) {
            Ok(message) => {
                let kind = message.kind().to_string();
                let outcome = dispatch(self.store.as_ref(), message);
                debug!("Handled {} frame: {:?}", kind, outcome);
            }
            Err(e) => warn!("Dropping malformed frame: {}", e),
        }
    }

    fn stop(&mut self) {
        self.connection.shutdown();
        self.publish();
        info!("Sync client stopped");
    }

    fn publish(&self) {
        self.status.send_replace(self.connection.snapshot());
    }
}

/// Close a sink, giving up after `limit`; true if the close finished in time
async fn close_within<S>(sink: &mut S, limit: Duration) -> bool
where
    S: Sink<Message> + Unpin,
{
    tokio::time::timeout(limit, sink.close()).await.is_ok()
}

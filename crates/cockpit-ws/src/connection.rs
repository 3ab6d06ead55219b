//! Push channel connection manager.
//!
//! Drives a [`ConnectionMachine`] against a real WebSocket transport:
//! opens the socket, sends the subscription request, routes decoded updates
//! downstream in arrival order and reconnects after a fixed delay whenever
//! the socket drops.

use crate::machine::{ConnectionAction, ConnectionEvent, ConnectionMachine};
use crate::message::{parse_inbound, InboundMessage, SubscribeRequest, DEFAULT_CHANNELS};
use cockpit_core::{ConnectionState, DecodedPatch};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Fixed delay before every reconnect attempt.
    pub reconnect_delay_ms: u64,
    /// Channels named in the subscription request.
    pub channels: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_delay_ms: 3000,
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// WebSocket connection manager.
///
/// Single use: once [`shutdown`](Self::shutdown) has been called the manager
/// never connects again. Create a new one per session.
pub struct ConnectionManager {
    config: ConnectionConfig,
    machine: Mutex<ConnectionMachine>,
    state_tx: watch::Sender<ConnectionState>,
    update_tx: mpsc::Sender<DecodedPatch>,
    messages_dropped: AtomicU64,
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager. Decoded updates are sent on `update_tx`.
    pub fn new(config: ConnectionConfig, update_tx: mpsc::Sender<DecodedPatch>) -> Self {
        let subscribe = SubscribeRequest::new(config.channels.clone());
        let machine = ConnectionMachine::new(
            Duration::from_millis(config.reconnect_delay_ms),
            subscribe,
        );
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            machine: Mutex::new(machine),
            state_tx,
            update_tx,
            messages_dropped: AtomicU64::new(0),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        self.machine.lock().state()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Reconnects scheduled since creation.
    pub fn reconnect_count(&self) -> u64 {
        self.machine.lock().reconnects_scheduled()
    }

    /// Frames discarded because they could not be parsed.
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    /// Signal graceful shutdown.
    ///
    /// Cancels any pending reconnect and closes the open socket. [`run`](Self::run)
    /// returns promptly afterwards.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and keep the connection alive until shutdown. Transport
    /// failures drive the reconnect cycle and are never returned.
    pub async fn run(&self) {
        let mut pending: VecDeque<ConnectionAction> =
            self.dispatch(ConnectionEvent::Connect).into();

        while let Some(action) = pending.pop_front() {
            let next = match action {
                ConnectionAction::OpenTransport => Some(self.open_and_serve().await),
                ConnectionAction::ScheduleReconnect(delay) => {
                    warn!(delay_ms = delay.as_millis() as u64, "Reconnecting");
                    tokio::select! {
                        () = tokio::time::sleep(delay) => Some(ConnectionEvent::ReconnectDue),
                        () = self.shutdown_token.cancelled() => {
                            info!("Shutdown requested during reconnect delay");
                            Some(ConnectionEvent::Teardown)
                        }
                    }
                }
                // Subscribe is sent inside the open socket; cancel and close
                // complete when the select above or the message loop exits.
                ConnectionAction::SendSubscribe(_)
                | ConnectionAction::CancelReconnect
                | ConnectionAction::CloseTransport => None,
            };

            if let Some(event) = next {
                pending.extend(self.dispatch(event));
            }
        }

        info!("Connection loop finished");
    }

    fn dispatch(&self, event: ConnectionEvent) -> Vec<ConnectionAction> {
        let (before, after, actions) = {
            let mut machine = self.machine.lock();
            let before = machine.state();
            let actions = machine.handle(event);
            (before, machine.state(), actions)
        };
        if before != after {
            info!(from = %before, to = %after, "Connection state changed");
            self.state_tx.send_replace(after);
        }
        actions
    }

    /// Open one socket and serve it until it drops. Returns the event that
    /// ended the socket.
    async fn open_and_serve(&self) -> ConnectionEvent {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let connect = connect_async_tls_with_config(&self.config.url, None, true, None);
        let ws_stream = tokio::select! {
            result = connect => match result {
                Ok((stream, _response)) => stream,
                Err(e) => {
                    error!(?e, "WebSocket connection failed");
                    return ConnectionEvent::Failed(e.to_string());
                }
            },
            () = self.shutdown_token.cancelled() => return ConnectionEvent::Teardown,
        };
        let (mut write, mut read) = ws_stream.split();

        for action in self.dispatch(ConnectionEvent::Opened) {
            let ConnectionAction::SendSubscribe(request) = action else {
                continue;
            };
            let sent = match request.to_json() {
                Ok(json) => write.send(Message::Text(json)).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = sent {
                error!(%e, "Failed to send subscription");
                return ConnectionEvent::Failed(e);
            }
            info!(channels = ?request.channels, "Subscription sent");
        }

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    return ConnectionEvent::Teardown;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                return ConnectionEvent::Failed(e.to_string());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return ConnectionEvent::Closed { code, reason };
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return ConnectionEvent::Failed(e.to_string());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return ConnectionEvent::Closed {
                                code: 1006,
                                reason: "stream ended".to_string(),
                            };
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    async fn handle_text_message(&self, text: &str) {
        let decoded = match parse_inbound(text) {
            Ok(InboundMessage::Update(decoded)) => decoded,
            Ok(InboundMessage::Ignored(kind)) => {
                debug!(%kind, "Ignoring message type");
                return;
            }
            Err(e) => {
                self.messages_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(?e, len = text.len(), "Dropping malformed message");
                return;
            }
        };

        for rejection in &decoded.rejected {
            warn!(field = %rejection.field, reason = %rejection.reason, "Rejected field in update");
        }
        if decoded.patch.is_empty() && decoded.rejected.is_empty() {
            return;
        }

        if self.update_tx.send(decoded).await.is_err() {
            warn!("Update receiver dropped");
        }
    }
}

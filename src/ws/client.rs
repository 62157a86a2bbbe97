//! Reconnecting WebSocket client

use super::reconnect::{ConnectionEvent, ConnectionState, ReconnectMachine};
use super::types::{WsConfig, WsError, WsMessage};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Capacity of the channel handed out by [`WsClient::connect`]
const CHANNEL_CAPACITY: usize = 1024;

/// How a live stream ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// Server sent a close frame
    ClosedByPeer,
    /// Our receiver is gone
    ReceiverDropped,
}

/// What the read loop should do with one inbound frame
enum Frame {
    Deliver(String),
    Reply(Message),
    PongReceived,
    Closed,
    Ignore,
}

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Frame::Deliver(text),
            Message::Ping(payload) => Frame::Reply(Message::Pong(payload)),
            Message::Pong(_) => Frame::PongReceived,
            Message::Close(_) => Frame::Closed,
            _ => Frame::Ignore,
        }
    }
}

/// Client-side ping schedule; one ping may be outstanding at a time
struct Keepalive {
    timer: Interval,
    outstanding: bool,
}

impl Keepalive {
    async fn start(period: Duration) -> Self {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Consume the immediate first tick
        timer.tick().await;
        Self {
            timer,
            outstanding: false,
        }
    }

    /// Wait for the next ping slot; errors if the previous ping went unanswered
    async fn due(&mut self) -> Result<(), WsError> {
        self.timer.tick().await;
        if self.outstanding {
            return Err(WsError::ConnectionFailed("Pong timeout".into()));
        }
        self.outstanding = true;
        Ok(())
    }

    fn answered(&mut self) {
        self.outstanding = false;
    }
}

/// One logical WebSocket subscription, reconnected as needed
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WsConfig::new(url))
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Spawn the connection task and return its message channel
    ///
    /// The channel carries text frames and lifecycle events (Connected,
    /// Reconnecting, Disconnected). Dropping the receiver stops the task at
    /// its next send or ping.
    pub fn connect(&self) -> mpsc::Receiver<WsMessage> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let config = self.config.clone();

        tokio::spawn(async move {
            if let Err(e) = Self::run_connection_loop(config, tx).await {
                tracing::error!(error = %e, "WebSocket connection loop failed");
            }
        });

        rx
    }

    /// Drive the reconnect machine until it stops
    async fn run_connection_loop(
        config: WsConfig,
        tx: mpsc::Sender<WsMessage>,
    ) -> Result<(), WsError> {
        let mut machine = ReconnectMachine::new(config.backoff);

        loop {
            let event = match machine.state() {
                ConnectionState::Connecting { attempt } => {
                    tracing::info!(url = %config.url, attempt, "Connecting to WebSocket");
                    match Self::connect_and_stream(&config, &tx, &mut machine).await {
                        Ok(StreamEnd::ReceiverDropped) => ConnectionEvent::Shutdown,
                        Ok(StreamEnd::ClosedByPeer) => {
                            tracing::info!("WebSocket closed by peer");
                            ConnectionEvent::Lost
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "WebSocket connection error");
                            ConnectionEvent::Lost
                        }
                    }
                }
                ConnectionState::Backoff { delay, .. } => {
                    if tx.is_closed() {
                        ConnectionEvent::Shutdown
                    } else {
                        sleep(delay).await;
                        ConnectionEvent::BackoffElapsed
                    }
                }
                ConnectionState::Subscribed => ConnectionEvent::Lost,
                ConnectionState::Stopped => break,
            };

            match machine.on_event(event) {
                ConnectionState::Backoff { attempt, delay } => {
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "WebSocket reconnecting..."
                    );
                    let _ = tx.send(WsMessage::Reconnecting { attempt, delay }).await;
                }
                ConnectionState::Stopped => {
                    let _ = tx.send(WsMessage::Disconnected).await;
                    if machine.gave_up() {
                        tracing::error!("Max reconnection attempts reached");
                        return Err(WsError::MaxReconnectsExceeded);
                    }
                    tracing::info!("WebSocket client stopped");
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Dial once and pump frames until the connection ends
    async fn connect_and_stream(
        config: &WsConfig,
        tx: &mpsc::Sender<WsMessage>,
        machine: &mut ReconnectMachine,
    ) -> Result<StreamEnd, WsError> {
        let (ws_stream, _response) = connect_async(&config.url)
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();

        machine.on_event(ConnectionEvent::Connected);
        tracing::info!(url = %config.url, "WebSocket connected");
        if tx.send(WsMessage::Connected).await.is_err() {
            return Ok(StreamEnd::ReceiverDropped);
        }

        let mut keepalive = Keepalive::start(config.ping_interval).await;

        loop {
            tokio::select! {
                next = stream.next() => {
                    let msg = match next {
                        Some(Ok(msg)) => msg,
                        Some(Err(e)) => return Err(WsError::ConnectionFailed(e.to_string())),
                        None => {
                            return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()))
                        }
                    };

                    match Frame::from(msg) {
                        Frame::Deliver(text) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                return Ok(StreamEnd::ReceiverDropped);
                            }
                        }
                        Frame::Reply(reply) => {
                            sink.send(reply)
                                .await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Frame::PongReceived => keepalive.answered(),
                        Frame::Closed => return Ok(StreamEnd::ClosedByPeer),
                        Frame::Ignore => {}
                    }
                }

                due = keepalive.due() => {
                    due?;
                    if tx.is_closed() {
                        return Ok(StreamEnd::ReceiverDropped);
                    }
                    sink.send(Message::Ping(Vec::new()))
                        .await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                }
            }
        }
    }
}

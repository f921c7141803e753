//! Connection manager: owns the single live socket and reconnects after
//! every close that was not requested.
//!
//! State machine: `Idle -> Connecting -> Open -> (ClosedClean | ClosedDirty)`,
//! then back to `Connecting` after the reconnect delay, with a fresh
//! connection each time. Retries never stop; the only exit is the shutdown
//! signal.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use uuid::Uuid;

use crate::dispatcher::Dispatcher;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tungstenite::Error>),
    #[error("websocket transport error: {0}")]
    Transport(Box<tungstenite::Error>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    ClosedClean,
    ClosedDirty,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::ClosedClean => "closed-clean",
            ConnectionState::ClosedDirty => "closed-dirty",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame(String),
    /// The peer completed a close handshake (`clean`) or the socket dropped.
    Closed { clean: bool },
}

pub type FrameStream = BoxStream<'static, Result<TransportEvent, ConnectionError>>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, endpoint: &str) -> Result<FrameStream, ConnectionError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, endpoint: &str) -> Result<FrameStream, ConnectionError> {
        let (socket, _) = connect_async(endpoint)
            .await
            .map_err(|e| ConnectionError::Connect(Box::new(e)))?;

        let frames = socket.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(TransportEvent::Frame(text.as_str().to_owned()))),
                Ok(Message::Close(frame)) => {
                    if let Some(frame) = frame {
                        debug!("close frame: {} {}", u16::from(frame.code), frame.reason.as_str());
                    }
                    Some(Ok(TransportEvent::Closed { clean: true }))
                }
                Ok(_) => None,
                Err(e) => Some(Err(ConnectionError::Transport(Box::new(e)))),
            }
        });
        Ok(frames.boxed())
    }
}

pub trait ReconnectPolicy: Send + Sync + 'static {
    fn next_delay(&mut self) -> Duration;
}

/// Same delay before every attempt, forever.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        FixedDelay { delay }
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&mut self) -> Duration {
        self.delay
    }
}

enum Ended {
    Closed,
    Shutdown,
}

pub struct ConnectionManager<T: Transport, P: ReconnectPolicy = FixedDelay> {
    endpoint: String,
    transport: T,
    policy: P,
    dispatcher: Dispatcher,
    state: watch::Sender<ConnectionState>,
    attempts: u64,
}

impl<T: Transport, P: ReconnectPolicy> ConnectionManager<T, P> {
    pub fn new(endpoint: String, transport: T, policy: P, dispatcher: Dispatcher) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        ConnectionManager {
            endpoint,
            transport,
            policy,
            dispatcher,
            state,
            attempts: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connect and keep reconnecting until `shutdown` flips to `true` or its
    /// sender goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let attempt = Uuid::new_v4();
            self.attempts += 1;
            self.set_state(ConnectionState::Connecting);
            info!(
                "[{attempt}] connecting to {} (attempt {})",
                self.endpoint, self.attempts
            );

            let connected = tokio::select! {
                result = self.transport.connect(&self.endpoint) => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(stream) => {
                    self.on_open(attempt);
                    if let Ended::Shutdown = self.pump(attempt, stream, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    self.on_transport_error(attempt, &e);
                    self.on_close(attempt, false);
                }
            }

            let delay = self.policy.next_delay();
            info!("[{attempt}] reconnecting in {delay:?}");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(ConnectionState::ClosedClean);
        info!("Connection manager stopped after {} attempts", self.attempts);
    }

    async fn pump(
        &self,
        attempt: Uuid,
        mut stream: FrameStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Ended {
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = shutdown.changed() => return Ended::Shutdown,
            };

            match next {
                Some(Ok(TransportEvent::Frame(text))) => self.on_frame(&text).await,
                Some(Ok(TransportEvent::Closed { clean })) => {
                    self.on_close(attempt, clean);
                    return Ended::Closed;
                }
                // tungstenite streams end after an error, so the error is
                // followed by the dirty close that drives the reconnect.
                Some(Err(e)) => {
                    self.on_transport_error(attempt, &e);
                    self.on_close(attempt, false);
                    return Ended::Closed;
                }
                None => {
                    self.on_close(attempt, false);
                    return Ended::Closed;
                }
            }
        }
    }

    fn on_open(&self, attempt: Uuid) {
        self.set_state(ConnectionState::Open);
        info!("[{attempt}] connected to {}", self.endpoint);
    }

    async fn on_frame(&self, text: &str) {
        self.dispatcher.dispatch(text).await;
    }

    fn on_close(&self, attempt: Uuid, clean: bool) {
        if clean {
            self.set_state(ConnectionState::ClosedClean);
            info!("[{attempt}] connection closed");
        } else {
            self.set_state(ConnectionState::ClosedDirty);
            warn!("[{attempt}] connection dropped");
        }
    }

    fn on_transport_error(&self, attempt: Uuid, error: &ConnectionError) {
        warn!("[{attempt}] {error}");
    }

    fn set_state(&self, state: ConnectionState) {
        debug!("connection state: {state}");
        self.state.send_replace(state);
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;

//! Connection handles, lifecycle states and the backend seam.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use crate::uri::ConnectionUri;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// What a backend reports about one live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Connected,
    Disconnected,
    Error(String),
}

/// Lifecycle notifications broadcast to subscribers of a storage instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ConnectionEvent {
    /// A new handle was opened and all models were rebound to it.
    Opened { generation: u64 },
    Connected { generation: u64 },
    Disconnected { generation: u64 },
    Error { generation: u64, message: String },
}

impl ConnectionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Opened { generation }
            | Self::Connected { generation }
            | Self::Disconnected { generation }
            | Self::Error { generation, .. } => *generation,
        }
    }
}

/// Channel a backend uses to report events for the connection it opened.
///
/// Tagged with the generation of that connection so events from a replaced
/// handle can be told apart.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, DriverEvent)>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, DriverEvent)>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, event: DriverEvent) {
        // The manager is gone; nobody is listening anymore.
        let _ = self.tx.send((self.generation, event));
    }
}

/// One opened connection. Never reused: reconnecting produces a new handle
/// with the next generation number.
#[derive(Debug)]
pub struct ConnectionHandle<C> {
    generation: u64,
    connection: C,
    state: watch::Sender<ConnectionState>,
}

impl<C> ConnectionHandle<C> {
    pub(crate) fn new(generation: u64, connection: C) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            generation,
            connection,
            state,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// Opens driver connections.
///
/// `connect` should return as soon as the driver handle exists; the outcome of
/// the actual network connection is reported later through the sink.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + Sync + 'static;
    type Collection: Send + Sync + 'static;

    fn connect(
        &self,
        uri: &ConnectionUri,
        events: EventSink,
    ) -> impl Future<Output = anyhow::Result<Self::Connection>> + Send;
}

/// Delay before reopening after consecutive disconnects: `initial * 2^n`,
/// capped at `max_delay`. The default reopens immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

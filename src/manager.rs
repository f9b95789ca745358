//! Owns the current connection and reacts to driver events.
//!
//! A disconnect reopens the connection with the original URI and rebinds every
//! registered model to the new handle. The handle and its models are swapped in
//! together; holders of an older [`Session`] keep a disconnected handle and
//! should fetch the current one after an [`ConnectionEvent::Opened`] event.

use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::connection::{
    ConnectionEvent, ConnectionHandle, ConnectionState, Connector, DriverEvent, EventSink,
    ReconnectPolicy,
};
use crate::error::{Result, StorageError};
use crate::logger::Logger;
use crate::registry::{BoundModels, ModelRegistry};
use crate::uri::ConnectionUri;

const EVENT_CAPACITY: usize = 64;

/// A connection handle and the models bound to it.
#[derive(Debug)]
pub struct Session<C, B> {
    handle: Arc<ConnectionHandle<C>>,
    models: Arc<BoundModels<B>>,
}

impl<C, B> Session<C, B> {
    pub fn handle(&self) -> &Arc<ConnectionHandle<C>> {
        &self.handle
    }

    pub fn models(&self) -> &Arc<BoundModels<B>> {
        &self.models
    }

    pub fn generation(&self) -> u64 {
        self.handle.generation()
    }
}

impl<C, B> Clone for Session<C, B> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            models: Arc::clone(&self.models),
        }
    }
}

type SessionOf<K> = Session<<K as Connector>::Connection, <K as Connector>::Collection>;
type RegistryOf<K> = ModelRegistry<<K as Connector>::Connection, <K as Connector>::Collection>;

struct Shared<K: Connector> {
    connector: K,
    uri: ConnectionUri,
    registry: RegistryOf<K>,
    logger: Arc<dyn Logger>,
    policy: ReconnectPolicy,
    session: RwLock<SessionOf<K>>,
    events: broadcast::Sender<ConnectionEvent>,
    driver_tx: mpsc::UnboundedSender<(u64, DriverEvent)>,
}

impl<K: Connector> Shared<K> {
    fn session(&self) -> SessionOf<K> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, session: SessionOf<K>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn publish(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn reopen(&self, generation: u64) {
        let sink = EventSink::new(generation, self.driver_tx.clone());
        match open_session(&self.connector, &self.uri, &self.registry, self.logger.as_ref(), sink).await {
            Ok(session) => {
                self.install(session);
                self.publish(ConnectionEvent::Opened { generation });
            }
            Err(err) => {
                self.logger
                    .error(format_args!("failed to reopen database connection: {err}"));
                let current = self.session();
                self.publish(ConnectionEvent::Error {
                    generation: current.generation(),
                    message: err.to_string(),
                });
            }
        }
    }
}

pub struct ConnectionManager<K: Connector> {
    shared: Arc<Shared<K>>,
    supervisor: JoinHandle<()>,
}

impl<K: Connector> ConnectionManager<K> {
    /// Opens the first connection and binds all models to it.
    ///
    /// Returns once the driver handle exists, usually still `Connecting`.
    /// Binding failures are fatal here.
    pub async fn open(
        connector: K,
        uri: ConnectionUri,
        registry: RegistryOf<K>,
        logger: Arc<dyn Logger>,
        policy: ReconnectPolicy,
    ) -> Result<Self> {
        let (driver_tx, driver_rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(0, driver_tx.clone());
        let session = open_session(&connector, &uri, &registry, logger.as_ref(), sink).await?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let shared = Arc::new(Shared {
            connector,
            uri,
            registry,
            logger,
            policy,
            session: RwLock::new(session),
            events,
            driver_tx,
        });
        let supervisor = tokio::spawn(supervise(Arc::clone(&shared), driver_rx));

        Ok(Self { shared, supervisor })
    }

    pub fn session(&self) -> SessionOf<K> {
        self.shared.session()
    }

    pub fn connection(&self) -> Arc<ConnectionHandle<K::Connection>> {
        Arc::clone(self.shared.session().handle())
    }

    pub fn models(&self) -> Arc<BoundModels<K::Collection>> {
        Arc::clone(self.shared.session().models())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.session().handle().state()
    }

    pub fn generation(&self) -> u64 {
        self.shared.session().generation()
    }

    pub fn uri(&self) -> &ConnectionUri {
        &self.shared.uri
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }
}

impl<K: Connector> Drop for ConnectionManager<K> {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

async fn open_session<K: Connector>(
    connector: &K,
    uri: &ConnectionUri,
    registry: &RegistryOf<K>,
    logger: &dyn Logger,
    sink: EventSink,
) -> Result<SessionOf<K>> {
    logger.info(format_args!("opening database connection to {}", uri.redacted()));

    let generation = sink.generation();
    let connection = connector
        .connect(uri, sink)
        .await
        .map_err(StorageError::Connect)?;
    let models = registry.bind_all(&connection)?;

    Ok(Session {
        handle: Arc::new(ConnectionHandle::new(generation, connection)),
        models: Arc::new(models),
    })
}

async fn supervise<K: Connector>(
    shared: Arc<Shared<K>>,
    mut driver_rx: mpsc::UnboundedReceiver<(u64, DriverEvent)>,
) {
    let mut next_generation = 1u64;
    let mut attempt = 0u32;

    while let Some((generation, event)) = driver_rx.recv().await {
        let session = shared.session();
        if generation != session.generation() {
            tracing::debug!(
                generation,
                current = session.generation(),
                ?event,
                "ignoring event from a replaced connection"
            );
            continue;
        }

        match event {
            DriverEvent::Connected => {
                attempt = 0;
                session.handle().set_state(ConnectionState::Connected);
                shared.logger.info(format_args!("connected to database"));
                shared.publish(ConnectionEvent::Connected { generation });
            }
            DriverEvent::Error(message) => {
                session.handle().set_state(ConnectionState::Errored);
                shared
                    .logger
                    .error(format_args!("failed to connect to database: {message}"));
                shared.publish(ConnectionEvent::Error { generation, message });
            }
            DriverEvent::Disconnected => {
                session.handle().set_state(ConnectionState::Disconnected);
                shared
                    .logger
                    .warn(format_args!("database connection closed, reconnecting..."));
                shared.publish(ConnectionEvent::Disconnected { generation });

                let delay = shared.policy.delay(attempt);
                attempt = attempt.saturating_add(1);
                if !delay.is_zero() {
                    tracing::debug!(?delay, attempt, "waiting before reconnecting");
                    tokio::time::sleep(delay).await;
                }

                shared.reopen(next_generation).await;
                next_generation += 1;
            }
        }
    }
}

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::config::ConnectionConfig;
use crate::connection::{ConnectionEvent, ConnectionHandle, ConnectionState, Connector, ReconnectPolicy};
use crate::db_mongo::{self, MongoConnector};
use crate::error::{Result, StorageError};
use crate::logger::{Logger, default_logger};
use crate::manager::{ConnectionManager, Session};
use crate::registry::{BoundModels, ModelRegistry};
use crate::uri::ConnectionUri;

#[derive(Clone, Default)]
pub struct StorageOptions {
    pub logger: Option<Arc<dyn Logger>>,
    pub reconnect: ReconnectPolicy,
}

impl StorageOptions {
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

impl std::fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageOptions")
            .field("logger", &self.logger.as_ref().map(|_| "custom"))
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

/// The storage layer: a supervised connection plus every model bound to it.
pub struct Storage<K: Connector = MongoConnector> {
    manager: ConnectionManager<K>,
}

impl Storage<MongoConnector> {
    /// Connects to MongoDB and binds the whole entity catalog.
    pub async fn open(config: ConnectionConfig, options: StorageOptions) -> Result<Self> {
        let registry = db_mongo::catalog_registry()?;
        Self::with_connector(MongoConnector::new(), &config, registry, options).await
    }

    /// Creates the indexes declared by the typed models on the current
    /// connection. Waits for the server to become reachable.
    pub async fn ensure_indexes(&self) -> Result<()> {
        db_mongo::ensure_indexes(&self.models())
            .await
            .map_err(StorageError::Operation)
    }
}

impl<K: Connector> Storage<K> {
    pub async fn with_connector(
        connector: K,
        config: &ConnectionConfig,
        registry: ModelRegistry<K::Connection, K::Collection>,
        options: StorageOptions,
    ) -> Result<Self> {
        let logger = options.logger.unwrap_or_else(default_logger);
        let uri = ConnectionUri::from_config(config);
        let manager = ConnectionManager::open(connector, uri, registry, logger, options.reconnect).await?;
        Ok(Self { manager })
    }

    pub fn connection(&self) -> Arc<ConnectionHandle<K::Connection>> {
        self.manager.connection()
    }

    pub fn models(&self) -> Arc<BoundModels<K::Collection>> {
        self.manager.models()
    }

    /// The current handle and models, consistent with each other.
    pub fn session(&self) -> Session<K::Connection, K::Collection> {
        self.manager.session()
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    pub fn generation(&self) -> u64 {
        self.manager.generation()
    }

    pub fn uri(&self) -> &ConnectionUri {
        self.manager.uri()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.manager.subscribe()
    }

    /// Lifecycle events as a stream. Events dropped by a lagging consumer are
    /// skipped.
    pub fn events(&self) -> impl Stream<Item = ConnectionEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!("connection event stream lagged: {err}");
                None
            }
        })
    }
}

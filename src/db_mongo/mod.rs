pub mod models;
pub mod monitor;

use anyhow::{Context, Result};
use mongodb::bson::Document;
use mongodb::event::EventHandler;
use mongodb::options::{ClientOptions, Tls, TlsOptions};
use mongodb::{Client, Collection, Database};

use crate::connection::{Connector, EventSink};
use crate::registry::{BindError, BoundModels, ModelRegistry};
use crate::uri::{ConnectionSettings, ConnectionUri};
use models::{ENTITIES, Mirror, Model, Referral, StorageEvent};
use monitor::topology_monitor;

/// Collections are bound untyped; see [`BoundModels::typed`].
pub type MongoCollection = Collection<Document>;
pub type MongoRegistry = ModelRegistry<MongoConnection, MongoCollection>;

/// A driver client and the database selected by the connection string.
#[derive(Debug, Clone)]
pub struct MongoConnection {
    client: Client,
    database: Database,
}

impl MongoConnection {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.database.collection(name)
    }
}

/// Opens MongoDB clients. Creating the client does not wait for the server;
/// reachability is reported through heartbeat events.
#[derive(Debug, Clone, Default)]
pub struct MongoConnector {
    app_name: Option<String>,
}

impl MongoConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_name(app_name: impl Into<String>) -> Self {
        Self {
            app_name: Some(app_name.into()),
        }
    }
}

impl Connector for MongoConnector {
    type Connection = MongoConnection;
    type Collection = MongoCollection;

    async fn connect(&self, uri: &ConnectionUri, events: EventSink) -> Result<MongoConnection> {
        let mut options = ClientOptions::parse(uri.to_string())
            .await
            .context("Failed to parse MongoDB connection string")?;

        apply_settings(&mut options, uri.settings());
        if self.app_name.is_some() {
            options.app_name = self.app_name.clone();
        }
        options.sdam_event_handler = Some(EventHandler::callback(topology_monitor(events)));

        let client = Client::with_options(options).context("Failed to create MongoDB client")?;
        let database = match client.default_database() {
            Some(database) => database,
            None => client.database(uri.database().unwrap_or("test")),
        };

        Ok(MongoConnection { client, database })
    }
}

/// TLS is enabled without certificate validation; multi-host routing turns
/// off direct connections so every listed router is used.
pub fn apply_settings(options: &mut ClientOptions, settings: ConnectionSettings) {
    if settings.tls {
        let tls = TlsOptions::builder().allow_invalid_certificates(true).build();
        options.tls = Some(Tls::Enabled(tls));
    }
    if settings.multi_host_routing {
        options.direct_connection = Some(false);
    }
}

/// Registry holding every entity of the catalog, each bound to its collection.
pub fn catalog_registry() -> Result<MongoRegistry, BindError> {
    let mut registry = MongoRegistry::new();
    for entity in ENTITIES {
        let collection = entity.collection;
        registry.register(entity.name, move |conn: &MongoConnection| {
            Ok(conn.collection::<Document>(collection))
        })?;
    }
    Ok(registry)
}

impl BoundModels<MongoCollection> {
    /// The collection bound for `M`, re-typed to its document struct.
    pub fn typed<M: Model>(&self) -> Option<Collection<M>> {
        self.get(M::NAME).map(|collection| collection.clone_with_type::<M>())
    }
}

/// Creates the indexes declared by the typed models.
pub async fn ensure_indexes(models: &BoundModels<MongoCollection>) -> Result<()> {
    create_indexes::<Mirror>(models).await?;
    create_indexes::<Referral>(models).await?;
    create_indexes::<StorageEvent>(models).await?;
    Ok(())
}

async fn create_indexes<M: Model>(models: &BoundModels<MongoCollection>) -> Result<()> {
    let indexes = M::indexes();
    if indexes.is_empty() {
        return Ok(());
    }

    let Some(collection) = models.typed::<M>() else {
        tracing::warn!(model = M::NAME, "model is not bound, skipping indexes");
        return Ok(());
    };

    collection
        .create_indexes(indexes)
        .await
        .with_context(|| format!("Failed to create indexes for {}", M::NAME))?;

    tracing::info!(model = M::NAME, collection = M::COLLECTION, "indexes ensured");
    Ok(())
}

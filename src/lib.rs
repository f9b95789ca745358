//! MongoDB storage layer for the bridge service.
//!
//! [`Storage`] builds the connection string from one or more endpoints, opens
//! a supervised connection, binds every registered model to it and reopens
//! the connection (rebinding the models) whenever it drops.
//!
//! ```no_run
//! use bridge_storage::{ConnectionConfig, EndpointConfig, Storage, StorageOptions};
//!
//! # async fn example() -> bridge_storage::Result<()> {
//! let config = ConnectionConfig::Single(EndpointConfig::new("127.0.0.1", 27017, "bridge"));
//! let storage = Storage::open(config, StorageOptions::default()).await?;
//!
//! let contacts = storage.models();
//! assert!(contacts.contains("Contact"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod db_mongo;
pub mod error;
pub mod logger;
pub mod manager;
pub mod registry;
pub mod storage;
pub mod uri;

pub use config::{ConfigError, ConnectionConfig, EndpointConfig, StorageConfig};
pub use connection::{
    ConnectionEvent, ConnectionHandle, ConnectionState, Connector, DriverEvent, EventSink,
    ReconnectPolicy,
};
pub use db_mongo::{MongoCollection, MongoConnection, MongoConnector};
pub use error::{Result, StorageError};
pub use logger::{Logger, TracingLogger};
pub use manager::{ConnectionManager, Session};
pub use registry::{BindError, BoundModels, ModelFactory, ModelRegistry};
pub use storage::{Storage, StorageOptions};
pub use uri::{ConnectionSettings, ConnectionUri, build_uri};

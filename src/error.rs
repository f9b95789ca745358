use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::BindError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open database connection: {0:#}")]
    Connect(#[source] anyhow::Error),

    #[error("database operation failed: {0:#}")]
    Operation(#[source] anyhow::Error),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;

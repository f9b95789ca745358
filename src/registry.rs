//! Model factories and binding them to a connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("model {0} is already registered")]
    DuplicateModel(String),

    #[error("failed to bind model {model}: {source:#}")]
    Factory {
        model: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type ModelFactory<C, B> = Arc<dyn Fn(&C) -> anyhow::Result<B> + Send + Sync>;

/// Entity name to factory. Built up front and handed to the storage layer,
/// which only reads it.
pub struct ModelRegistry<C, B> {
    factories: Vec<(String, ModelFactory<C, B>)>,
}

impl<C, B> ModelRegistry<C, B> {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<&mut Self, BindError>
    where
        F: Fn(&C) -> anyhow::Result<B> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(BindError::DuplicateModel(name));
        }
        self.factories.push((name, Arc::new(factory)));
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(registered, _)| registered == name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|(name, _)| name.as_str())
    }

    /// Runs every factory against `connection`. The first failure aborts the
    /// whole binding.
    pub fn bind_all(&self, connection: &C) -> Result<BoundModels<B>, BindError> {
        let mut models = HashMap::with_capacity(self.factories.len());
        for (name, factory) in &self.factories {
            let bound = factory(connection).map_err(|source| BindError::Factory {
                model: name.clone(),
                source,
            })?;
            models.insert(name.clone(), bound);
        }
        Ok(BoundModels { models })
    }
}

impl<C, B> Default for ModelRegistry<C, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, B> fmt::Debug for ModelRegistry<C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Collections bound to one connection, keyed by entity name.
#[derive(Debug, Clone)]
pub struct BoundModels<B> {
    models: HashMap<String, B>,
}

impl<B> BoundModels<B> {
    pub fn get(&self, name: &str) -> Option<&B> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &B)> {
        self.models.iter().map(|(name, bound)| (name.as_str(), bound))
    }
}

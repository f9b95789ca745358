use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::connection::ReconnectPolicy;

const DEFAULT_PORT: u16 = 27017;
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value {value:?} for {name}")]
    InvalidVar { name: &'static str, value: String },

    #[error("invalid connection config: {0}")]
    Json(#[from] serde_json::Error),
}

/// One database host with its credentials and transport flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mongos: Option<bool>,
}

impl EndpointConfig {
    pub fn new(host: impl Into<String>, port: u16, name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            name: name.into(),
            user: None,
            pass: None,
            ssl: None,
            mongos: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.pass = Some(pass.into());
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    pub fn with_mongos(mut self, mongos: bool) -> Self {
        self.mongos = Some(mongos);
        self
    }
}

/// A single endpoint or an ordered list of endpoints (sharded deployments).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectionConfig {
    Single(EndpointConfig),
    Multiple(Vec<EndpointConfig>),
}

impl ConnectionConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn endpoints(&self) -> &[EndpointConfig] {
        match self {
            Self::Single(endpoint) => std::slice::from_ref(endpoint),
            Self::Multiple(endpoints) => endpoints,
        }
    }
}

impl From<EndpointConfig> for ConnectionConfig {
    fn from(endpoint: EndpointConfig) -> Self {
        Self::Single(endpoint)
    }
}

impl From<Vec<EndpointConfig>> for ConnectionConfig {
    fn from(endpoints: Vec<EndpointConfig>) -> Self {
        Self::Multiple(endpoints)
    }
}

/// Everything the binary needs to open storage, read from the environment.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub connection: ConnectionConfig,
    pub reconnect: ReconnectPolicy,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    ///
    /// `MONGO_HOSTS` (`host:port,host:port`) takes precedence over
    /// `MONGO_HOST`/`MONGO_PORT` and yields one endpoint per entry, all sharing
    /// the database name, credentials and flags.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup("MONGO_DB").ok_or(ConfigError::MissingVar("MONGO_DB"))?;
        let user = lookup("MONGO_USER").filter(|v| !v.is_empty());
        let pass = lookup("MONGO_PASS").filter(|v| !v.is_empty());
        let ssl = parse_var(&lookup, "MONGO_SSL", parse_bool)?;
        let mongos = parse_var(&lookup, "MONGO_MONGOS", parse_bool)?;

        let endpoint = |host: String, port: u16| EndpointConfig {
            host,
            port,
            name: name.clone(),
            user: user.clone(),
            pass: pass.clone(),
            ssl,
            mongos,
        };

        let connection = match lookup("MONGO_HOSTS").filter(|v| !v.trim().is_empty()) {
            Some(hosts) => {
                let endpoints = hosts
                    .split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(|entry| {
                        let (host, port) = split_host_port(entry)?;
                        Ok(endpoint(host, port))
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                ConnectionConfig::Multiple(endpoints)
            }
            None => {
                let host = lookup("MONGO_HOST").ok_or(ConfigError::MissingVar("MONGO_HOST"))?;
                let port = parse_var(&lookup, "MONGO_PORT", |v| v.parse::<u16>().ok())?
                    .unwrap_or(DEFAULT_PORT);
                ConnectionConfig::Single(endpoint(host, port))
            }
        };

        let initial_ms = parse_var(&lookup, "MONGO_RECONNECT_INITIAL_MS", |v| v.parse::<u64>().ok())?;
        let max_ms = parse_var(&lookup, "MONGO_RECONNECT_MAX_MS", |v| v.parse::<u64>().ok())?;
        let reconnect = reconnect_policy(initial_ms, max_ms)?;

        Ok(Self { connection, reconnect })
    }
}

fn parse_var<F, T>(
    lookup: &F,
    name: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => parse(value.trim())
            .map(Some)
            .ok_or(ConfigError::InvalidVar { name, value }),
    }
}

/// Without an explicit cap the delay may grow to
/// `max(initial, DEFAULT_MAX_RECONNECT_DELAY)`. A cap below the initial delay
/// is rejected.
fn reconnect_policy(initial_ms: Option<u64>, max_ms: Option<u64>) -> Result<ReconnectPolicy, ConfigError> {
    let initial = initial_ms.map(Duration::from_millis).unwrap_or(Duration::ZERO);
    let max = match max_ms {
        Some(ms) => Duration::from_millis(ms),
        None if initial.is_zero() => Duration::ZERO,
        None => initial.max(DEFAULT_MAX_RECONNECT_DELAY),
    };

    if initial > max {
        return Err(ConfigError::InvalidVar {
            name: "MONGO_RECONNECT_MAX_MS",
            value: max.as_millis().to_string(),
        });
    }

    Ok(ReconnectPolicy::exponential(initial, max))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_host_port(entry: &str) -> Result<(String, u16), ConfigError> {
    match entry.rsplit_once(':') {
        None => Ok((entry.to_string(), DEFAULT_PORT)),
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidVar {
                name: "MONGO_HOSTS",
                value: entry.to_string(),
            })?;
            Ok((host.to_string(), port))
        }
    }
}

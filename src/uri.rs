//! Connection string construction.
//!
//! Performs no validation of hosts, ports or names; malformed values surface
//! later as driver errors.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::fmt;

use crate::config::{ConnectionConfig, EndpointConfig};

pub const SCHEME: &str = "mongodb://";

// RFC 3986 unreserved characters stay as-is.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Connection string for a single endpoint:
/// `mongodb://[user:pass@]host:port/name`.
///
/// Credentials are only emitted when both user and password are present.
pub fn build_uri(endpoint: &EndpointConfig) -> String {
    EndpointUri::from(endpoint).render(false)
}

/// Connection-wide options derived from the endpoint descriptors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub multi_host_routing: bool,
    pub tls: bool,
}

impl ConnectionSettings {
    /// For a list, an option is turned on by any descriptor enabling it; a
    /// later `false` does not turn it back off.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        match config {
            ConnectionConfig::Single(endpoint) => Self {
                multi_host_routing: endpoint.mongos.unwrap_or(false),
                tls: endpoint.ssl.unwrap_or(false),
            },
            ConnectionConfig::Multiple(endpoints) => {
                endpoints.iter().fold(Self::default(), |mut settings, endpoint| {
                    if endpoint.mongos == Some(true) {
                        settings.multi_host_routing = true;
                    }
                    if endpoint.ssl == Some(true) {
                        settings.tls = true;
                    }
                    settings
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EndpointUri {
    credentials: Option<(String, String)>,
    address: String,
    database: String,
}

impl From<&EndpointConfig> for EndpointUri {
    fn from(endpoint: &EndpointConfig) -> Self {
        let credentials = match (&endpoint.user, &endpoint.pass) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.clone(), pass.clone()))
            }
            _ => None,
        };

        Self {
            credentials,
            address: format!("{}:{}", endpoint.host, endpoint.port),
            database: endpoint.name.clone(),
        }
    }
}

impl EndpointUri {
    fn userinfo(&self, redact: bool) -> String {
        match &self.credentials {
            None => String::new(),
            Some((user, pass)) => {
                let pass = if redact {
                    "****".to_string()
                } else {
                    utf8_percent_encode(pass, USERINFO).to_string()
                };
                format!("{}:{}@", utf8_percent_encode(user, USERINFO), pass)
            }
        }
    }

    fn render(&self, redact: bool) -> String {
        format!("{SCHEME}{}{}/{}", self.userinfo(redact), self.address, self.database)
    }
}

/// The full connection string for one or more endpoints plus the derived
/// connection-wide settings.
///
/// Multiple endpoints render with a single scheme, the credentials and
/// database name of the first endpoint, and every `host:port` joined by a
/// comma: `mongodb://user:pass@a:1,b:2/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    endpoints: Vec<EndpointUri>,
    settings: ConnectionSettings,
}

impl ConnectionUri {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            endpoints: config.endpoints().iter().map(EndpointUri::from).collect(),
            settings: ConnectionSettings::from_config(config),
        }
    }

    pub fn settings(&self) -> ConnectionSettings {
        self.settings
    }

    /// Database name of the first endpoint.
    pub fn database(&self) -> Option<&str> {
        self.endpoints.first().map(|e| e.database.as_str())
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|e| e.address.as_str())
    }

    /// Same as `to_string()` with the password masked, for logging.
    pub fn redacted(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let Some(first) = self.endpoints.first() else {
            return format!("{SCHEME}/");
        };

        let hosts = self.hosts().collect::<Vec<_>>().join(",");
        format!("{SCHEME}{}{}/{}", first.userinfo(redact), hosts, first.database)
    }
}

impl From<&ConnectionConfig> for ConnectionUri {
    fn from(config: &ConnectionConfig) -> Self {
        Self::from_config(config)
    }
}

impl fmt::Display for ConnectionUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

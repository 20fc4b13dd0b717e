//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::errors::{SharedError, SharedResult};

/// Host the emulator binds to unless configured otherwise
pub const DEFAULT_HOST: &str = "localhost";

/// Default emulator port. Deliberately not the emulator's own default (8081)
/// so that a manually started instance is left alone.
pub const DEFAULT_PORT: u16 = 8088;

/// Project identifier used when none is configured
pub const DEFAULT_PROJECT: &str = "test";

/// Environment variable names shared with the datastore client library.
///
/// These names are an integration contract and must stay stable.
pub mod env_vars {
    /// Base URL of a running emulator (`http://host:port`), read for discovery
    pub const DATASTORE_HOST: &str = "DATASTORE_HOST";
    /// Project the emulator serves, read for discovery
    pub const DATASTORE_PROJECT_ID: &str = "DATASTORE_PROJECT_ID";
    /// `host:port` the client library connects to
    pub const DATASTORE_EMULATOR_HOST: &str = "DATASTORE_EMULATOR_HOST";
    pub const DATASTORE_EMULATOR_HOST_PATH: &str = "DATASTORE_EMULATOR_HOST_PATH";
    pub const DATASTORE_DATASET: &str = "DATASTORE_DATASET";

    pub const ALL: [&str; 5] = [
        DATASTORE_DATASET,
        DATASTORE_EMULATOR_HOST,
        DATASTORE_EMULATOR_HOST_PATH,
        DATASTORE_HOST,
        DATASTORE_PROJECT_ID,
    ];
}

/// Component emitting log events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentId {
    /// The lifecycle controller library and its CLI
    Controller,
    /// The stub emulator used by the test suites
    StubEmulator,
}

impl ComponentId {
    /// Tracing target (crate name) owned by this component
    pub fn target(&self) -> &'static str {
        match self {
            ComponentId::Controller => "dsemu",
            ComponentId::StubEmulator => "tester",
        }
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentId::Controller => write!(f, "controller"),
            ComponentId::StubEmulator => write!(f, "stub-emulator"),
        }
    }
}

/// Where a running emulator can be reached
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub project: String,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16, project: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            project: project.into(),
        }
    }

    /// Parse a base URL such as `http://localhost:8081`
    pub fn from_url(input: &str, project: impl Into<String>) -> SharedResult<Self> {
        let invalid = || SharedError::InvalidUrl {
            input: input.to_string(),
        };

        let url = Url::parse(input).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?;
        let port = url.port_or_known_default().ok_or_else(invalid)?;

        Ok(Self::new(host, port, project))
    }

    /// Parse a `host:port` pair such as `localhost:8081`
    pub fn from_host_port(input: &str, project: impl Into<String>) -> SharedResult<Self> {
        let (host, port) = input.rsplit_once(':').ok_or_else(|| SharedError::InvalidConfig {
            field: "host_port".to_string(),
            value: input.to_string(),
        })?;

        let port = port.parse::<u16>().map_err(|_| SharedError::InvalidConfig {
            field: "port".to_string(),
            value: port.to_string(),
        })?;

        if host.is_empty() {
            return Err(SharedError::InvalidConfig {
                field: "host".to_string(),
                value: input.to_string(),
            });
        }

        Ok(Self::new(host, port, project))
    }

    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.host_port())
    }

    pub fn emulator_host_path(&self) -> String {
        format!("{}/datastore", self.host_port())
    }

    /// The full variable set published for the client library
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            (env_vars::DATASTORE_DATASET, self.project.clone()),
            (env_vars::DATASTORE_EMULATOR_HOST, self.host_port()),
            (env_vars::DATASTORE_EMULATOR_HOST_PATH, self.emulator_host_path()),
            (env_vars::DATASTORE_HOST, self.base_url()),
            (env_vars::DATASTORE_PROJECT_ID, self.project.clone()),
        ]
    }
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PROJECT)
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (project {})", self.base_url(), self.project)
    }
}

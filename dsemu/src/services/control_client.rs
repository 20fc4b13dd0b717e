//! HTTP client for the emulator's control endpoint
//!
//! The emulator answers `GET /` with 200 once it serves requests, clears
//! its store on `POST /reset` and exits after `POST /shutdown`.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{EmulatorError, EmulatorResult};
use crate::traits::{ControlConnector, ControlEndpoint};
use shared::{component_debug, ComponentId, ConnectionInfo};

pub const HEALTHCHECK_PATH: &str = "/";
pub const RESET_PATH: &str = "/reset";
pub const SHUTDOWN_PATH: &str = "/shutdown";

/// Upper bound for a single liveness probe
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound for reset and shutdown requests
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request paths of the control endpoint, relative to the base URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlPaths {
    pub healthcheck: String,
    pub reset: String,
    pub shutdown: String,
}

impl Default for ControlPaths {
    fn default() -> Self {
        Self {
            healthcheck: HEALTHCHECK_PATH.to_string(),
            reset: RESET_PATH.to_string(),
            shutdown: SHUTDOWN_PATH.to_string(),
        }
    }
}

/// Control client bound to one emulator base URL
#[derive(Clone, Debug)]
pub struct ControlClient {
    base_url: String,
    paths: ControlPaths,
    client: reqwest::Client,
}

impl ControlClient {
    pub fn new(connection: &ConnectionInfo) -> EmulatorResult<Self> {
        Self::from_base_url(connection.base_url())
    }

    /// Create a client for `base_url`, e.g. `http://localhost:8081`
    pub fn from_base_url(base_url: impl Into<String>) -> EmulatorResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        // Local endpoints only: never route control traffic through a proxy
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()?;

        Ok(Self {
            base_url,
            paths: ControlPaths::default(),
            client,
        })
    }

    /// Use non-default request paths
    pub fn with_paths(mut self, paths: ControlPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn paths(&self) -> &ControlPaths {
        &self.paths
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn post(&self, path: &str) -> Result<(), String> {
        let response = self
            .client
            .post(self.url(path))
            .send()
            .await
            .map_err(|e| format!("{} unreachable: {}", self.url(path), e))?;

        if response.status() != StatusCode::OK {
            return Err(format!(
                "emulator {} request failed with status code {}",
                path.trim_start_matches('/'),
                response.status().as_u16()
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ControlEndpoint for ControlClient {
    async fn health(&self) -> bool {
        match self
            .client
            .get(self.url(&self.paths.healthcheck))
            .timeout(HEALTH_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                component_debug!(ComponentId::Controller, "Health probe of {} failed: {}", self.base_url, e);
                false
            }
        }
    }

    async fn reset(&self) -> EmulatorResult<()> {
        self.post(&self.paths.reset).await.map_err(EmulatorError::reset)?;
        component_debug!(ComponentId::Controller, "🧹 Emulator at {} reset", self.base_url);
        Ok(())
    }

    async fn shutdown(&self) -> EmulatorResult<()> {
        self.post(&self.paths.shutdown).await.map_err(EmulatorError::shutdown)
    }
}

/// Connector producing HTTP control clients
#[derive(Clone, Debug, Default)]
pub struct HttpConnector {
    paths: ControlPaths,
}

impl HttpConnector {
    pub fn new(paths: ControlPaths) -> Self {
        Self { paths }
    }
}

impl ControlConnector for HttpConnector {
    fn connect(&self, connection: &ConnectionInfo) -> EmulatorResult<Arc<dyn ControlEndpoint>> {
        Ok(Arc::new(ControlClient::new(connection)?.with_paths(self.paths.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = ControlClient::from_base_url("http://localhost:8081/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8081");
        assert_eq!(client.url(RESET_PATH), "http://localhost:8081/reset");
        assert_eq!(client.url(HEALTHCHECK_PATH), "http://localhost:8081/");
        assert_eq!(client.url("admin/reset"), "http://localhost:8081/admin/reset");
    }

    #[test]
    fn test_client_from_connection() {
        let client = ControlClient::new(&ConnectionInfo::new("127.0.0.1", 8714, "test")).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8714");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Port 9 (discard) is essentially never served on loopback
        let client = ControlClient::from_base_url("http://127.0.0.1:9").unwrap();
        assert!(!client.health().await);

        let error = client.reset().await.unwrap_err();
        assert!(error.is_reset());
    }
}

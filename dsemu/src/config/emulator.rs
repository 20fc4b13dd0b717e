//! Emulator Configuration
//!
//! Configuration structure for the emulator command line and the
//! controller's timing knobs.

use super::builder::EmulatorConfigBuilder;
use crate::error::{EmulatorError, EmulatorResult};
use crate::services::control_client::ControlPaths;
use shared::{ConnectionInfo, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_PROJECT};
use std::path::PathBuf;
use std::time::Duration;

/// Binary looked up on `PATH` when no explicit binary is configured
pub const EMULATOR_BINARY: &str = "gcloud";

pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Environment overrides understood by [`EmulatorConfig::from_env`]
pub mod overrides {
    pub const HOST: &str = "DSEMU_HOST";
    pub const PORT: &str = "DSEMU_PORT";
    pub const PROJECT: &str = "DSEMU_PROJECT";
    pub const DATA_DIR: &str = "DSEMU_DATA_DIR";
    pub const STARTUP_TIMEOUT_SECS: &str = "DSEMU_STARTUP_TIMEOUT_SECS";
    pub const BINARY: &str = "DSEMU_BINARY";
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmulatorConfig {
    pub host: String,
    pub port: u16,
    pub project: String,
    /// Persist emulator data here instead of keeping it in memory
    pub data_dir: Option<PathBuf>,
    /// Passed through to the emulator after the generated flags
    pub extra_args: Vec<String>,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
    /// How long to wait after SIGTERM (and again after SIGKILL)
    pub shutdown_grace: Duration,
    /// Explicit emulator binary; `gcloud` on `PATH` otherwise
    pub binary: Option<PathBuf>,
    /// Health, reset and shutdown request paths
    pub control_paths: ControlPaths,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            project: DEFAULT_PROJECT.to_string(),
            data_dir: None,
            extra_args: Vec::new(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            binary: None,
            control_paths: ControlPaths::default(),
        }
    }
}

impl EmulatorConfig {
    /// Create a new builder
    pub fn builder() -> EmulatorConfigBuilder {
        EmulatorConfigBuilder::new()
    }

    /// Defaults with `DSEMU_*` environment overrides applied
    pub fn from_env() -> EmulatorResult<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values
    pub fn with_env_overrides<F>(mut self, lookup: F) -> EmulatorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(overrides::HOST) {
            self.host = host;
        }

        if let Some(port) = lookup(overrides::PORT) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| EmulatorError::config(overrides::PORT, port.clone()))?;
        }

        if let Some(project) = lookup(overrides::PROJECT) {
            self.project = project;
        }

        if let Some(data_dir) = lookup(overrides::DATA_DIR) {
            self.data_dir = Some(PathBuf::from(data_dir));
        }

        if let Some(timeout) = lookup(overrides::STARTUP_TIMEOUT_SECS) {
            let secs: u64 = timeout
                .trim()
                .parse()
                .map_err(|_| EmulatorError::config(overrides::STARTUP_TIMEOUT_SECS, timeout.clone()))?;
            self.startup_timeout = Duration::from_secs(secs);
        }

        if let Some(binary) = lookup(overrides::BINARY) {
            self.binary = Some(PathBuf::from(binary));
        }

        Ok(self)
    }

    /// Check that the configuration can describe a running emulator
    pub fn validate(&self) -> EmulatorResult<()> {
        if self.host.trim().is_empty() {
            return Err(EmulatorError::config("host", &self.host));
        }
        if self.port == 0 {
            return Err(EmulatorError::config("port", "0"));
        }
        if self.project.trim().is_empty() {
            return Err(EmulatorError::config("project", &self.project));
        }
        if self.startup_timeout.is_zero() {
            return Err(EmulatorError::config("startup_timeout", "0s"));
        }
        if self.poll_interval.is_zero() {
            return Err(EmulatorError::config("poll_interval", "0s"));
        }
        let paths = &self.control_paths;
        for (field, path) in [
            ("healthcheck_path", &paths.healthcheck),
            ("reset_path", &paths.reset),
            ("shutdown_path", &paths.shutdown),
        ] {
            if path.trim().is_empty() {
                return Err(EmulatorError::config(field, path.as_str()));
            }
        }
        Ok(())
    }

    /// Connection parameters an owned instance will listen on
    pub fn connection(&self) -> ConnectionInfo {
        ConnectionInfo::new(self.host.clone(), self.port, self.project.clone())
    }

    /// Arguments following the binary for `start`
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["beta", "emulators", "datastore", "start", "--consistency=1.0"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        args.push(format!("--host-port={}:{}", self.host, self.port));
        args.push(format!("--project={}", self.project));

        match self.data_dir {
            Some(ref dir) => args.push(format!("--data-dir={}", dir.display())),
            None => args.push("--no-store-on-disk".to_string()),
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_args_keep_storage_in_memory() {
        let config = EmulatorConfig::default();
        assert_eq!(
            config.to_args(),
            vec![
                "beta",
                "emulators",
                "datastore",
                "start",
                "--consistency=1.0",
                "--host-port=localhost:8088",
                "--project=test",
                "--no-store-on-disk",
            ]
        );
    }

    #[test]
    fn test_data_dir_and_extra_args() {
        let config = EmulatorConfig {
            data_dir: Some(PathBuf::from("/tmp/ds")),
            extra_args: vec!["--verbosity=debug".to_string()],
            ..EmulatorConfig::default()
        };

        let args = config.to_args();
        assert!(args.contains(&"--data-dir=/tmp/ds".to_string()));
        assert!(!args.contains(&"--no-store-on-disk".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--verbosity=debug"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (overrides::PORT, "8714"),
            (overrides::PROJECT, "ci"),
            (overrides::STARTUP_TIMEOUT_SECS, "90"),
            (overrides::BINARY, "/opt/gcloud/bin/gcloud"),
        ]
        .into_iter()
        .collect();

        let config = EmulatorConfig::default()
            .with_env_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.port, 8714);
        assert_eq!(config.project, "ci");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.startup_timeout, Duration::from_secs(90));
        assert_eq!(config.binary, Some(PathBuf::from("/opt/gcloud/bin/gcloud")));
    }

    #[test]
    fn test_malformed_env_override_is_a_config_error() {
        let result = EmulatorConfig::default()
            .with_env_overrides(|key| (key == overrides::PORT).then(|| "eighty".to_string()));

        match result {
            Err(EmulatorError::Config { field, value }) => {
                assert_eq!(field, overrides::PORT);
                assert_eq!(value, "eighty");
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate() {
        assert!(EmulatorConfig::default().validate().is_ok());

        let bad_port = EmulatorConfig { port: 0, ..EmulatorConfig::default() };
        assert!(bad_port.validate().is_err());

        let bad_project = EmulatorConfig { project: " ".to_string(), ..EmulatorConfig::default() };
        assert!(bad_project.validate().is_err());

        let bad_timeout = EmulatorConfig {
            startup_timeout: Duration::ZERO,
            ..EmulatorConfig::default()
        };
        assert!(bad_timeout.validate().is_err());
    }
}

//! Emulator Configuration Builder
//!
//! Provides a fluent builder for constructing emulator configurations

use super::EmulatorConfig;
use std::path::PathBuf;
use std::time::Duration;

pub struct EmulatorConfigBuilder {
    config: EmulatorConfig,
}

impl EmulatorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EmulatorConfig::default(),
        }
    }

    /// Start from an existing configuration (e.g. one loaded from the environment)
    pub fn from_config(config: EmulatorConfig) -> Self {
        Self { config }
    }

    /// Set the bind host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the bind port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the project identifier
    pub fn project<S: Into<String>>(mut self, project: S) -> Self {
        self.config.project = project.into();
        self
    }

    /// Persist data in `dir` instead of memory
    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.data_dir = Some(dir.into());
        self
    }

    /// Append a passthrough command-line option
    pub fn extra_arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Append several passthrough command-line options, keeping their order
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set how long to wait for the emulator to become ready
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = timeout;
        self
    }

    /// Set the spacing between readiness probes
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the grace period between SIGTERM and SIGKILL
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Use an explicit emulator binary instead of `gcloud` on `PATH`
    pub fn binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.config.binary = Some(binary.into());
        self
    }

    /// Path probed for liveness (default `/`)
    pub fn healthcheck_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.control_paths.healthcheck = path.into();
        self
    }

    /// Path that clears emulator data (default `/reset`)
    pub fn reset_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.control_paths.reset = path.into();
        self
    }

    /// Path that asks the emulator to exit (default `/shutdown`)
    pub fn shutdown_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.control_paths.shutdown = path.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> EmulatorConfig {
        self.config
    }
}

impl Default for EmulatorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

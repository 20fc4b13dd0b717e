//! Trait definitions with mockall annotations for testing
//!
//! The controller reaches the emulator's control endpoint and its process
//! only through these traits, so the lifecycle logic can be exercised
//! against mocks.

use crate::config::EmulatorConfig;
use crate::error::{EmulatorResult, TeardownWarning};
use shared::ConnectionInfo;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

/// Control endpoint of a running emulator
#[mockall::automock]
#[async_trait::async_trait]
pub trait ControlEndpoint: Send + Sync {
    /// Lightweight liveness probe; `true` only when the emulator answers 200
    async fn health(&self) -> bool;

    /// Clear all emulator data. A single attempt; no retries.
    async fn reset(&self) -> EmulatorResult<()>;

    /// Ask the emulator to exit
    async fn shutdown(&self) -> EmulatorResult<()>;
}

/// Creates control endpoints for a discovered or configured address
#[mockall::automock]
pub trait ControlConnector: Send + Sync {
    fn connect(&self, connection: &ConnectionInfo) -> EmulatorResult<Arc<dyn ControlEndpoint>>;
}

/// A spawned emulator process owned by the controller
#[mockall::automock]
#[async_trait::async_trait]
pub trait EmulatorProcess: Send {
    fn pid(&self) -> u32;

    /// Exit status if the process has already exited
    fn try_exit_status(&mut self) -> EmulatorResult<Option<ExitStatus>>;

    /// Output captured so far, for startup diagnostics
    async fn collect_diagnostics(&mut self) -> Vec<String>;

    /// Stop the process; `Some` when it outlived every signal
    async fn terminate(&mut self, grace: Duration) -> Option<TeardownWarning>;
}

/// Starts emulator processes from a configuration
#[mockall::automock]
pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, config: &EmulatorConfig) -> EmulatorResult<Box<dyn EmulatorProcess>>;
}

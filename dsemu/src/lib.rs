//! Lifecycle controller for the Datastore emulator
//!
//! Gives integration test suites a disposable, resettable emulator: reuse an
//! instance advertised through the environment, or spawn and own a new one
//! for the duration of a scope.

pub mod config;
pub mod emulator;
pub mod env;
pub mod error;
pub mod services;
pub mod state;
pub mod traits;

// Re-export commonly used types
pub use config::{EmulatorConfig, EmulatorConfigBuilder};
pub use emulator::{Emulator, EmulatorHandle};
pub use error::{EmulatorError, EmulatorResult, TeardownWarning};
pub use services::{CommandLauncher, ControlClient, ControlPaths, HttpConnector};
pub use shared::ConnectionInfo;
pub use state::{OwnershipMode, Readiness};
pub use traits::{ControlConnector, ControlEndpoint, EmulatorProcess, ProcessLauncher};

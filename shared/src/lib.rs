//! Shared types for the datastore emulator workspace
//!
//! Contains the connection parameters, environment variable names and
//! logging helpers used by both the controller (`dsemu`) and the stub
//! emulator used in tests.

pub mod env_init;
pub mod errors;
pub mod logging;
pub mod types;

pub use env_init::EnvInit;
pub use errors::*;
pub use types::*;

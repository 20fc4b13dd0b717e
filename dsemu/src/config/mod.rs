//! Configuration Management
//!
//! Configuration structures and builders for the emulator controller.

pub mod builder;
pub mod emulator;

pub use builder::EmulatorConfigBuilder;
pub use emulator::{
    EmulatorConfig, DEFAULT_POLL_INTERVAL, DEFAULT_SHUTDOWN_GRACE, DEFAULT_STARTUP_TIMEOUT,
    EMULATOR_BINARY,
};

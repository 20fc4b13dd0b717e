//! Common test utilities shared by the dsemu integration suites

pub mod helpers;

pub use helpers::*;

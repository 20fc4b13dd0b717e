//! Shared error types for the datastore emulator workspace

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid URL: {input}")]
    InvalidUrl { input: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Failed to parse env-init output: missing {key}")]
    EnvInitMissing { key: String },

    #[error("Failed to parse env-init output: malformed line '{line}'")]
    EnvInitMalformed { line: String },
}

pub type SharedResult<T> = Result<T, SharedError>;

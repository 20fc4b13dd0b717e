//! Error types for the stub emulator

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StubError {
    #[error("Unsupported command: {0} (expected `beta emulators datastore start|env-init`)")]
    UnsupportedCommand(String),

    #[error("Invalid consistency {0}: must be between 0.0 and 1.0")]
    InvalidConsistency(f64),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error(transparent)]
    Shared(#[from] SharedError),
}

pub type StubResult<T> = Result<T, StubError>;

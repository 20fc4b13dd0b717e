//! Controller error types

use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Usage error: {message}")]
    Usage { message: String },

    #[error("Emulator startup failed: {reason}{}", format_diagnostics(.diagnostics))]
    Startup { reason: String, diagnostics: Vec<String> },

    #[error("Emulator reset failed: {message}")]
    Reset { message: String },

    #[error("Emulator shutdown request failed: {message}")]
    Shutdown { message: String },

    #[error("Configuration error: {field} = {value}")]
    Config { field: String, value: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmulatorError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage { message: message.into() }
    }

    pub fn startup(reason: impl Into<String>) -> Self {
        Self::Startup {
            reason: reason.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn startup_with_diagnostics(reason: impl Into<String>, diagnostics: Vec<String>) -> Self {
        Self::Startup {
            reason: reason.into(),
            diagnostics,
        }
    }

    pub fn reset(message: impl Into<String>) -> Self {
        Self::Reset { message: message.into() }
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown { message: message.into() }
    }

    pub fn config(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Captured emulator output attached to a startup failure
    pub fn diagnostics(&self) -> &[String] {
        match self {
            Self::Startup { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }

    pub fn is_startup(&self) -> bool {
        matches!(self, Self::Startup { .. })
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset { .. })
    }
}

fn format_diagnostics(diagnostics: &[String]) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!("\n--- emulator output ---\n{}", diagnostics.join("\n"))
    }
}

/// An owned emulator process that outlived SIGKILL.
///
/// Teardown runs at session end, so this is logged rather than returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownWarning {
    pub pid: u32,
    pub message: String,
}

impl std::fmt::Display for TeardownWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "emulator process {} did not exit: {}", self.pid, self.message)
    }
}

pub type EmulatorResult<T> = Result<T, EmulatorError>;

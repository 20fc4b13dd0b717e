//! Controller state types

use std::fmt;

/// Who is responsible for the emulator process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipMode {
    /// Spawned by this controller and terminated on release
    Owned,
    /// An already-running instance reused and left running on release
    Attached,
}

impl fmt::Display for OwnershipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnershipMode::Owned => write!(f, "owned"),
            OwnershipMode::Attached => write!(f, "attached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Starting,
    Ready,
    /// Timed out or exited before the first successful probe
    Failed,
}

impl Readiness {
    /// Starting may move to Ready or Failed; both are terminal
    pub fn can_transition_to(self, next: Readiness) -> bool {
        matches!(
            (self, next),
            (Readiness::Starting, Readiness::Ready) | (Readiness::Starting, Readiness::Failed)
        )
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Starting => write!(f, "starting"),
            Readiness::Ready => write!(f, "ready"),
            Readiness::Failed => write!(f, "failed"),
        }
    }
}

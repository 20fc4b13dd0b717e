//! Service implementations used by the controller

pub mod control_client;
pub mod diagnostics;
pub mod process;

pub use control_client::{ControlClient, ControlPaths, HttpConnector};
pub use diagnostics::Diagnostics;
pub use process::{resolve_binary, CommandLauncher, OwnedProcess};

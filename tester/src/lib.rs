//! Stub Datastore emulator
//!
//! A stand-in for `gcloud beta emulators datastore` that speaks the same
//! command line and control protocol, so the lifecycle controller can be
//! tested end to end on machines without the Cloud SDK.

pub mod error;
pub mod server;
pub mod store;

pub use error::{StubError, StubResult};
pub use server::StubServer;
pub use store::EntityStore;

/// Address to bind for `host`. `localhost` binds IPv4 loopback only.
pub fn bind_host(host: &str) -> &str {
    match host {
        "localhost" => "127.0.0.1",
        other => other,
    }
}

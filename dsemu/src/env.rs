//! Process-wide environment channel
//!
//! The datastore client library locates the emulator through environment
//! variables. This module is the only place that reads or writes them.
//! Lifecycle: published once when an acquisition completes, left untouched
//! while the emulator is acquired, restored when it is released.

use shared::{component_debug, env_vars, ComponentId, ConnectionInfo};

/// Connection advertised by a previously started emulator, if any.
///
/// Requires both `DATASTORE_HOST` (a base URL) and `DATASTORE_PROJECT_ID`.
pub fn discover() -> Option<ConnectionInfo> {
    discover_with(|key| std::env::var(key).ok())
}

/// [`discover`] against an arbitrary variable lookup
pub fn discover_with<F>(lookup: F) -> Option<ConnectionInfo>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup(env_vars::DATASTORE_HOST)?;
    let project = lookup(env_vars::DATASTORE_PROJECT_ID)?;

    match ConnectionInfo::from_url(host.trim(), project) {
        Ok(connection) => Some(connection),
        Err(e) => {
            component_debug!(ComponentId::Controller, "Ignoring advertised emulator: {}", e);
            None
        }
    }
}

/// Variables [`discover`] reads; an attached instance was found through them
const DISCOVERY_VARS: [&str; 2] = [env_vars::DATASTORE_HOST, env_vars::DATASTORE_PROJECT_ID];

/// Whether already-set variables are replaced on publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Replace every variable (owned instances)
    Overwrite,
    /// Leave the advertised discovery variables alone and correct every
    /// other variable that is missing or disagrees (attached instances)
    KeepDiscovery,
}

/// Variables written by [`publish`], with the values they replaced.
///
/// Dropping it restores them.
#[must_use = "dropping the guard restores the environment immediately"]
#[derive(Debug, Default)]
pub struct PublishedEnv {
    entries: Vec<(&'static str, Option<String>)>,
}

impl PublishedEnv {
    /// Names of the variables this publication wrote
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Put every written variable back to its previous state. Idempotent.
    pub fn restore(&mut self) {
        for (name, previous) in self.entries.drain(..).rev() {
            match previous {
                Some(value) => set_var(name, &value),
                None => remove_var(name),
            }
        }
    }
}

impl Drop for PublishedEnv {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Publish `connection` for the client library
pub fn publish(connection: &ConnectionInfo, mode: PublishMode) -> PublishedEnv {
    let mut published = PublishedEnv::default();

    for (name, value) in connection.env_pairs() {
        let previous = std::env::var(name).ok();
        if mode == PublishMode::KeepDiscovery
            && previous.is_some()
            && (DISCOVERY_VARS.contains(&name) || previous.as_deref() == Some(value.as_str()))
        {
            continue;
        }
        set_var(name, &value);
        published.entries.push((name, previous));
    }

    component_debug!(
        ComponentId::Controller,
        "🔧 Published {} for {:?}",
        connection,
        published.names()
    );
    published
}

fn set_var(name: &str, value: &str) {
    // SAFETY: only the controller driving the single active emulator
    // lifecycle writes these variables.
    unsafe { std::env::set_var(name, value) };
}

fn remove_var(name: &str) {
    // SAFETY: see `set_var`.
    unsafe { std::env::remove_var(name) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    #[test]
    fn test_discover_requires_host_and_project() {
        let only_host: HashMap<&str, &str> = [(env_vars::DATASTORE_HOST, "http://localhost:8081")].into_iter().collect();
        assert!(discover_with(|k| only_host.get(k).map(|v| v.to_string())).is_none());

        let both: HashMap<&str, &str> = [
            (env_vars::DATASTORE_HOST, "http://localhost:8081"),
            (env_vars::DATASTORE_PROJECT_ID, "shared"),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            discover_with(|k| both.get(k).map(|v| v.to_string())),
            Some(ConnectionInfo::new("localhost", 8081, "shared"))
        );
    }

    #[test]
    fn test_discover_ignores_malformed_host() {
        let vars: HashMap<&str, &str> = [
            (env_vars::DATASTORE_HOST, "localhost:8081"),
            (env_vars::DATASTORE_PROJECT_ID, "shared"),
        ]
        .into_iter()
        .collect();
        // A bare host:port parses as a URL with scheme "localhost" and no host
        assert!(discover_with(|k| vars.get(k).map(|v| v.to_string())).is_none());
    }

    #[test]
    #[serial]
    fn test_publish_overwrite_and_restore() {
        set_var(env_vars::DATASTORE_PROJECT_ID, "previous");
        remove_var(env_vars::DATASTORE_EMULATOR_HOST);

        let connection = ConnectionInfo::new("localhost", 8714, "test");
        let mut published = publish(&connection, PublishMode::Overwrite);

        assert_eq!(published.names().len(), env_vars::ALL.len());
        assert_eq!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST).unwrap(), "localhost:8714");
        assert_eq!(std::env::var(env_vars::DATASTORE_PROJECT_ID).unwrap(), "test");

        published.restore();
        assert!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST).is_err());
        assert_eq!(std::env::var(env_vars::DATASTORE_PROJECT_ID).unwrap(), "previous");

        published.restore();
        assert_eq!(std::env::var(env_vars::DATASTORE_PROJECT_ID).unwrap(), "previous");
        remove_var(env_vars::DATASTORE_PROJECT_ID);
    }

    #[test]
    #[serial]
    fn test_publish_keep_discovery_leaves_advertised_values() {
        for name in env_vars::ALL {
            remove_var(name);
        }
        set_var(env_vars::DATASTORE_HOST, "http://localhost:8081/");

        let connection = ConnectionInfo::new("localhost", 8081, "test");
        let mut published = publish(&connection, PublishMode::KeepDiscovery);

        assert!(!published.names().contains(&env_vars::DATASTORE_HOST));
        assert_eq!(std::env::var(env_vars::DATASTORE_HOST).unwrap(), "http://localhost:8081/");
        assert_eq!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST).unwrap(), "localhost:8081");

        published.restore();
        assert_eq!(std::env::var(env_vars::DATASTORE_HOST).unwrap(), "http://localhost:8081/");
        assert!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST).is_err());
        remove_var(env_vars::DATASTORE_HOST);
    }

    #[test]
    #[serial]
    fn test_dropping_guard_restores() {
        for name in env_vars::ALL {
            remove_var(name);
        }

        {
            let _published = publish(&ConnectionInfo::new("localhost", 8714, "test"), PublishMode::Overwrite);
            assert!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST).is_ok());
        }

        assert!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST).is_err());
        assert!(std::env::var(env_vars::DATASTORE_DATASET).is_err());
    }

    #[test]
    #[serial]
    fn test_publish_keep_discovery_replaces_stale_client_variables() {
        for name in env_vars::ALL {
            remove_var(name);
        }
        set_var(env_vars::DATASTORE_HOST, "http://localhost:8081");
        set_var(env_vars::DATASTORE_PROJECT_ID, "shared");
        set_var(env_vars::DATASTORE_EMULATOR_HOST, "localhost:9999");
        set_var(env_vars::DATASTORE_DATASET, "shared");

        let connection = ConnectionInfo::new("localhost", 8081, "shared");
        let mut published = publish(&connection, PublishMode::KeepDiscovery);

        assert_eq!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST).unwrap(), "localhost:8081");
        assert_eq!(
            std::env::var(env_vars::DATASTORE_EMULATOR_HOST_PATH).unwrap(),
            "localhost:8081/datastore"
        );
        // Already consistent, so not rewritten
        assert!(!published.names().contains(&env_vars::DATASTORE_DATASET));

        published.restore();
        assert_eq!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST).unwrap(), "localhost:9999");
        assert!(std::env::var(env_vars::DATASTORE_EMULATOR_HOST_PATH).is_err());
        assert_eq!(std::env::var(env_vars::DATASTORE_HOST).unwrap(), "http://localhost:8081");

        for name in env_vars::ALL {
            remove_var(name);
        }
    }
}

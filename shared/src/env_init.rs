//! `env-init` output handling
//!
//! The emulator binary prints the variables a client needs as shell
//! `export KEY=VALUE` lines. This module renders that format for a known
//! connection and parses it back.

use crate::errors::{SharedError, SharedResult};
use crate::types::{env_vars, ConnectionInfo};

/// Connection parameters announced by `env-init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvInit {
    /// Base URL, e.g. `http://localhost:8081`
    pub host: String,
    /// `host:port` pair
    pub emulator_host: String,
    pub project_id: String,
}

impl EnvInit {
    /// Parse `env-init` output. Keys are matched by suffix so that prefixed
    /// variants are still recognized.
    pub fn parse(output: &str) -> SharedResult<Self> {
        let mut host = None;
        let mut emulator_host = None;
        let mut project_id = None;

        for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let assignment = line
                .strip_prefix("export ")
                .or_else(|| line.strip_prefix("set "))
                .unwrap_or(line);

            let (key, value) = assignment.split_once('=').ok_or_else(|| SharedError::EnvInitMalformed {
                line: line.to_string(),
            })?;
            let value = value.trim().to_string();

            if key.ends_with(env_vars::DATASTORE_HOST) {
                host = Some(value);
            } else if key.ends_with(env_vars::DATASTORE_EMULATOR_HOST) {
                emulator_host = Some(value);
            } else if key.ends_with(env_vars::DATASTORE_PROJECT_ID) {
                project_id = Some(value);
            }
        }

        let missing = |key: &str| SharedError::EnvInitMissing { key: key.to_string() };

        Ok(Self {
            host: host.ok_or_else(|| missing(env_vars::DATASTORE_HOST))?,
            emulator_host: emulator_host.ok_or_else(|| missing(env_vars::DATASTORE_EMULATOR_HOST))?,
            project_id: project_id.ok_or_else(|| missing(env_vars::DATASTORE_PROJECT_ID))?,
        })
    }

    /// Render the full variable set for `info` in `env-init` format
    pub fn render(info: &ConnectionInfo) -> String {
        info.env_pairs()
            .into_iter()
            .map(|(key, value)| format!("export {key}={value}\n"))
            .collect()
    }

    pub fn connection(&self) -> SharedResult<ConnectionInfo> {
        ConnectionInfo::from_host_port(&self.emulator_host, self.project_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GCLOUD_OUTPUT: &str = "export DATASTORE_DATASET=test
export DATASTORE_EMULATOR_HOST=localhost:8081
export DATASTORE_EMULATOR_HOST_PATH=localhost:8081/datastore
export DATASTORE_HOST=http://localhost:8081
export DATASTORE_PROJECT_ID=test
";

    #[test]
    fn test_parse_gcloud_output() {
        let parsed = EnvInit::parse(GCLOUD_OUTPUT).unwrap();
        assert_eq!(parsed.host, "http://localhost:8081");
        assert_eq!(parsed.emulator_host, "localhost:8081");
        assert_eq!(parsed.project_id, "test");
        assert_eq!(parsed.connection().unwrap(), ConnectionInfo::new("localhost", 8081, "test"));
    }

    #[test]
    fn test_parse_without_export_prefix() {
        let output = "DATASTORE_HOST=http://127.0.0.1:9000\nDATASTORE_EMULATOR_HOST=127.0.0.1:9000\nDATASTORE_PROJECT_ID=p\n";
        let parsed = EnvInit::parse(output).unwrap();
        assert_eq!(parsed.connection().unwrap().port, 9000);
    }

    #[test]
    fn test_parse_reports_missing_key() {
        let output = "export DATASTORE_HOST=http://localhost:8081\nexport DATASTORE_PROJECT_ID=test\n";
        match EnvInit::parse(output) {
            Err(SharedError::EnvInitMissing { key }) => assert_eq!(key, "DATASTORE_EMULATOR_HOST"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_malformed_line() {
        let result = EnvInit::parse("Executing: something without assignment");
        assert!(matches!(result, Err(SharedError::EnvInitMalformed { .. })));
    }

    #[test]
    fn test_render_matches_gcloud_format() {
        let rendered = EnvInit::render(&ConnectionInfo::new("localhost", 8081, "test"));
        assert_eq!(rendered, GCLOUD_OUTPUT);
    }
}

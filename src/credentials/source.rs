//! Where credential records come from
//!
//! The manager reads its accounts through [`CredentialSource`] exactly once per
//! (re)load. A source that cannot be reached at all is a startup failure; a
//! single bad record is the manager's problem, not the source's.

use super::CredentialRecord;
use crate::config::{CredentialsConfig, ADMIN_ROLE};
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supplies the administrative accounts the server may log in
pub trait CredentialSource: Send + Sync {
    /// Return every administrative account record
    fn query_admin_credentials(&self) -> Result<Vec<CredentialRecord>>;
}

/// A fixed, in-memory list of records, filtered to one role like the file source
#[derive(Debug, Clone)]
pub struct StaticCredentialSource {
    records: Vec<CredentialRecord>,
    role: String,
}

impl StaticCredentialSource {
    /// Serve the records whose role is [`ADMIN_ROLE`]
    pub fn new(records: Vec<CredentialRecord>) -> Self {
        Self::with_role(records, ADMIN_ROLE)
    }

    pub fn with_role(records: Vec<CredentialRecord>, role: impl Into<String>) -> Self {
        Self {
            records,
            role: role.into(),
        }
    }
}

impl CredentialSource for StaticCredentialSource {
    fn query_admin_credentials(&self) -> Result<Vec<CredentialRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.role == self.role)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    accounts: Vec<CredentialRecord>,
}

/// Reads `[[accounts]]` tables from a TOML file, keeping one role
///
/// ```toml
/// [[accounts]]
/// role = "ADM"
/// username = "benoit"
/// salt = "<base64>"
/// iterations = 4096
/// stored_key = "<hex>"
/// server_key = "<hex>"
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialSource {
    path: PathBuf,
    role: String,
}

impl FileCredentialSource {
    pub fn new<P: AsRef<Path>>(path: P, role: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            role: role.into(),
        }
    }

    /// Build from the `credentials` section of the configuration
    pub fn from_config(config: &CredentialsConfig) -> Result<Self> {
        let path = config.source_file.as_ref().ok_or_else(|| {
            ProtocolError::ConfigError("credentials.source_file is not set".to_string())
        })?;
        Ok(Self::new(path, config.admin_role.clone()))
    }

    /// Write records in the format this source reads
    pub fn write_records<P: AsRef<Path>>(path: P, records: &[CredentialRecord]) -> Result<()> {
        let file = CredentialFile {
            accounts: records.to_vec(),
        };
        let content = toml::to_string_pretty(&file).map_err(|e| {
            ProtocolError::CredentialSource(format!("Failed to serialize credentials: {e}"))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl CredentialSource for FileCredentialSource {
    fn query_admin_credentials(&self) -> Result<Vec<CredentialRecord>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ProtocolError::CredentialSource(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))
        })?;

        let file: CredentialFile = toml::from_str(&content).map_err(|e| {
            ProtocolError::CredentialSource(format!(
                "Failed to parse {}: {e}",
                self.path.display()
            ))
        })?;

        let total = file.accounts.len();
        let records: Vec<_> = file
            .accounts
            .into_iter()
            .filter(|record| record.role == self.role)
            .collect();

        debug!(
            path = %self.path.display(),
            total,
            kept = records.len(),
            role = %self.role,
            "Read credential file"
        );
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scram-session-{}-{name}.toml", std::process::id()))
    }

    #[test]
    fn file_source_filters_role() {
        let path = temp_path("filter");
        let admin = CredentialRecord::from_password("ADM", "benoit", "pw", &[1; 24], 4096).unwrap();
        let student = CredentialRecord::from_password("STU", "kim", "pw", &[2; 24], 4096).unwrap();
        FileCredentialSource::write_records(&path, &[admin.clone(), student]).unwrap();

        let records = FileCredentialSource::new(&path, "ADM")
            .query_admin_credentials()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records, vec![admin]);
    }

    #[test]
    fn static_source_filters_role() {
        let admin = CredentialRecord::from_password("ADM", "benoit", "pw", &[1; 24], 4096).unwrap();
        let student = CredentialRecord::from_password("STU", "kim", "pw", &[2; 24], 4096).unwrap();
        let records = vec![admin.clone(), student.clone()];

        let admins = StaticCredentialSource::new(records.clone());
        assert_eq!(admins.query_admin_credentials().unwrap(), vec![admin]);

        let students = StaticCredentialSource::with_role(records, "STU");
        assert_eq!(students.query_admin_credentials().unwrap(), vec![student]);
    }

    #[test]
    fn missing_file_is_a_source_error() {
        let source = FileCredentialSource::new(temp_path("missing-does-not-exist"), "ADM");
        assert!(matches!(
            source.query_admin_credentials(),
            Err(ProtocolError::CredentialSource(_))
        ));
    }

    #[test]
    fn iterations_default_when_absent() {
        let path = temp_path("defaults");
        std::fs::write(
            &path,
            "[[accounts]]\nrole = \"ADM\"\nusername = \"a\"\nsalt = \"AA==\"\nstored_key = \"00\"\nserver_key = \"00\"\n",
        )
        .unwrap();
        let records = FileCredentialSource::new(&path, "ADM")
            .query_admin_credentials()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].iterations, 4096);
    }

    #[test]
    fn from_config_requires_path() {
        let config = CredentialsConfig::default();
        assert!(FileCredentialSource::from_config(&config).is_err());
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DatastoreError, DsResult};

/// Configuration for opening an [`ObjectDatastore`](crate::ObjectDatastore).
///
/// ```toml
/// access_grant = "file:///var/lib/objds"
/// bucket = "blocks"
/// log_file = "/var/log/objds.log"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Credential used to open the project.
    pub access_grant: String,
    /// Bucket holding every object of this datastore.
    pub bucket: String,
    /// Append diagnostic lines to this file. Diagnostics are discarded
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl DatastoreConfig {
    pub fn new(access_grant: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            access_grant: access_grant.into(),
            bucket: bucket.into(),
            log_file: None,
        }
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> DsResult<Self> {
        toml::from_str(s).map_err(|e| DatastoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> DsResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DatastoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Check that every required field is present.
    pub fn validate(&self) -> DsResult<()> {
        if self.access_grant.trim().is_empty() {
            return Err(DatastoreError::Config("access_grant must not be empty".into()));
        }
        if self.bucket.trim().is_empty() {
            return Err(DatastoreError::Config("bucket must not be empty".into()));
        }
        if self.log_file.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(DatastoreError::Config("log_file must not be empty when set".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_toml() {
        let config = DatastoreConfig::from_toml_str(
            r#"
            access_grant = "mem://test"
            bucket = "blocks"
            log_file = "/tmp/objds.log"
            "#,
        )
        .unwrap();
        assert_eq!(config.access_grant, "mem://test");
        assert_eq!(config.bucket, "blocks");
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/objds.log")));
        config.validate().unwrap();
    }

    #[test]
    fn log_file_is_optional() {
        let config =
            DatastoreConfig::from_toml_str("access_grant = \"mem://x\"\nbucket = \"b\"").unwrap();
        assert!(config.log_file.is_none());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = DatastoreConfig::from_toml_str("bucket = ").unwrap_err();
        assert!(matches!(err, DatastoreError::Config(_)));
        assert!(err.is_startup());
    }

    #[test]
    fn validate_rejects_missing_fields() {
        assert!(DatastoreConfig::new("", "b").validate().is_err());
        assert!(DatastoreConfig::new("mem://x", " ").validate().is_err());
        assert!(DatastoreConfig::new("mem://x", "b")
            .with_log_file("")
            .validate()
            .is_err());
        assert!(DatastoreConfig::new("mem://x", "b").validate().is_ok());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objds.toml");
        let config = DatastoreConfig::new("mem://x", "b").with_log_file("diag.log");
        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();
        assert_eq!(DatastoreConfig::load(&path).unwrap(), config);
        assert!(DatastoreConfig::load(dir.path().join("missing.toml")).is_err());
    }
}

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

const DB_FILE_NAME: &str = "ledger.db";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub data_dir: PathBuf,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
    /// Tracing filter directive (e.g. "campaign_ledger=debug"). Falls back to RUST_LOG.
    pub log_filter: Option<String>,
}

impl LedgerConfig {
    /// Reads a TOML config file. Missing keys take their default values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: LedgerConfig =
            toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("data_dir cannot be empty".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            busy_timeout_ms: 5000,
            log_filter: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = LedgerConfig::from_toml("data_dir = \"/srv/ledger\"").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/ledger"));
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.log_filter.is_none());
        assert_eq!(config.db_path(), PathBuf::from("/srv/ledger/ledger.db"));
    }

    #[test]
    fn test_full_config() {
        let config = LedgerConfig::from_toml(
            r#"
            data_dir = "./campaign"
            busy_timeout_ms = 250
            log_filter = "campaign_ledger=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.log_filter.as_deref(), Some("campaign_ledger=debug"));
    }

    #[test]
    fn test_rejects_empty_data_dir() {
        let result = LedgerConfig::from_toml("data_dir = \"\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_wrong_types() {
        let result = LedgerConfig::from_toml("busy_timeout_ms = \"soon\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}

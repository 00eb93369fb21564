//! Pipeline configuration, loaded from a JSON file with per-section defaults.
//! Configuration errors are fatal at construction time, never at batch time.

use crate::error::Error;
use crate::policy::WindowThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DfpConfig {
    /// Directory scanned for incoming batch files (driver binary).
    pub input_dir: PathBuf,
    /// Root for persisted per-user history and emitted windows. Must be writable.
    pub cache_dir: PathBuf,
    /// Column names in incoming records.
    pub columns: ColumnsConfig,
    /// Per-user splitting of raw record streams.
    pub split: SplitConfig,
    /// Emission thresholds.
    pub thresholds: WindowThresholds,
    /// Logging.
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub timestamp: String,
    pub userid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Users dropped before splitting.
    pub skip_users: Vec<String>,
    /// When non-empty, only these users are kept.
    pub only_users: Vec<String>,
    /// User id assigned to rows missing the userid column.
    pub fallback_username: String,
    /// Route all rows to the fallback user as one combined stream.
    pub include_generic: bool,
    /// Route rows to their individual users.
    pub include_individual: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for DfpConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            cache_dir: PathBuf::from(".dfp-cache"),
            columns: ColumnsConfig::default(),
            split: SplitConfig::default(),
            thresholds: WindowThresholds::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            userid: "username".to_string(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            skip_users: Vec::new(),
            only_users: Vec::new(),
            fallback_username: "generic_user".to_string(),
            include_generic: false,
            include_individual: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl DfpConfig {
    /// Load from a JSON file if present; a missing file yields the defaults,
    /// an unparsable one is a configuration error.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("unreadable config {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("invalid config {}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.columns.timestamp.is_empty() {
            return Err(Error::Config("timestamp column name must not be empty".into()));
        }
        if self.columns.userid.is_empty() {
            return Err(Error::Config("userid column name must not be empty".into()));
        }
        if self.thresholds.max_history > 0 && self.thresholds.max_history < self.thresholds.min_history {
            return Err(Error::Config(format!(
                "max_history ({}) must be >= min_history ({})",
                self.thresholds.max_history, self.thresholds.min_history
            )));
        }
        if !self.split.include_generic && !self.split.include_individual {
            return Err(Error::Config(
                "at least one of include_generic / include_individual must be set".into(),
            ));
        }
        std::fs::create_dir_all(&self.cache_dir)
            .map_err(|e| Error::Config(format!("cache_dir {} not writable: {e}", self.cache_dir.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_is_default() {
        let c = DfpConfig::load(Path::new("nonexistent.json")).unwrap();
        assert_eq!(c.columns.timestamp, "timestamp");
        assert_eq!(c.columns.userid, "username");
        assert_eq!(c.thresholds.min_history, 300);
        assert!(c.split.include_individual);
    }

    #[test]
    fn load_invalid_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{oops").unwrap();
        assert!(matches!(DfpConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_inverted_history_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = DfpConfig {
            cache_dir: dir.path().join("cache"),
            ..DfpConfig::default()
        };
        c.thresholds.min_history = 300;
        c.thresholds.max_history = 100;
        assert!(matches!(c.validate(), Err(Error::Config(_))));
        c.thresholds.max_history = 0; // unbounded is fine
        c.validate().unwrap();
    }
}

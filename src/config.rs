//! Modqueue configuration.
//!
//! Loaded from `~/.modqueue/config.toml`. Every key is optional; a missing
//! file means defaults throughout.
//!
//! ```toml
//! database = "/var/lib/modqueue/queue.sqlite"
//!
//! [storage]
//! upsert = "emulated"
//!
//! [moderation]
//! automoderated = ["Trusted"]
//! unmoderated-namespaces = [2, 3]
//! ```

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::{rights::ModerationRights, storage::UpsertStrategy};

/// Modqueue configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Database file. Defaults to `~/.modqueue/modqueue.sqlite`.
    pub database: Option<PathBuf>,
    pub storage: StorageConfig,
    pub moderation: ModerationRights,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageConfig {
    pub upsert: UpsertStrategy,
}

impl Config {
    /// Load config from `~/.modqueue/config.toml`, or defaults if there is
    /// no such file.
    pub fn load() -> Result<Self, String> {
        let path = Self::path().ok_or("could not determine home directory")?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;

        Self::parse(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The config file path: `~/.modqueue/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".modqueue").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn parses_every_section() {
        let config = Config::parse(
            r#"
            database = "/tmp/queue.sqlite"

            [storage]
            upsert = "emulated"

            [moderation]
            automoderated = ["Trusted"]
            unmoderated-namespaces = [2, 3]
            "#,
        )
        .unwrap();

        assert_eq!(config.database, Some(PathBuf::from("/tmp/queue.sqlite")));
        assert_eq!(config.storage.upsert, UpsertStrategy::Emulated);
        assert_eq!(config.moderation.automoderated, vec!["Trusted"]);
        assert_eq!(config.moderation.unmoderated_namespaces, vec![2, 3]);
    }

    #[test]
    fn unknown_upsert_strategy_is_rejected() {
        assert!(Config::parse("[storage]\nupsert = \"merge\"").is_err());
    }
}

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use ordinal_common::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FOLDER: &str = "./internal/db/migrations/";
pub const DEFAULT_TABLE: &str = "migrations";

/// How migration file text is cut into statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Split on every `;`, with no awareness of quotes or comments.
    #[default]
    Naive,
    /// Skip `;` inside quoted strings, quoted identifiers and comments.
    Aware,
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(Self::Naive),
            "aware" => Ok(Self::Aware),
            other => Err(format!("unknown split mode '{other}' (expected naive or aware)")),
        }
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Naive => f.write_str("naive"),
            Self::Aware => f.write_str("aware"),
        }
    }
}

/// A partial set of settings, as read from a config file or from the command
/// line. Later layers override earlier ones field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverlay {
    pub db: Option<PathBuf>,
    pub folder: Option<PathBuf>,
    pub table: Option<String>,
    pub create_table: Option<bool>,
    pub split: Option<SplitMode>,
    pub transactional: Option<bool>,
}

impl ConfigOverlay {
    /// Layer `other` on top of `self`; values set in `other` win.
    pub fn merge(self, other: ConfigOverlay) -> ConfigOverlay {
        ConfigOverlay {
            db: other.db.or(self.db),
            folder: other.folder.or(self.folder),
            table: other.table.or(self.table),
            create_table: other.create_table.or(self.create_table),
            split: other.split.or(self.split),
            transactional: other.transactional.or(self.transactional),
        }
    }
}

/// Validated settings for one migration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrateConfig {
    /// SQLite database file the migrations run against.
    pub db: PathBuf,
    /// Directory holding `<id>.<ext>` migration files.
    pub folder: PathBuf,
    /// Name of the ledger table.
    pub table: String,
    /// Create the ledger table when it is missing.
    pub create_table: bool,
    pub split: SplitMode,
    /// Run each migration file and its ledger row inside one transaction.
    pub transactional: bool,
}

impl MigrateConfig {
    /// Fill defaults into `overlay` and validate the result.
    pub fn from_overlay(overlay: ConfigOverlay) -> Result<Self> {
        let db = overlay
            .db
            .ok_or_else(|| Error::Config("missing required value: db".into()))?;

        let config = Self {
            db,
            folder: overlay.folder.unwrap_or_else(|| PathBuf::from(DEFAULT_FOLDER)),
            table: overlay.table.unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            create_table: overlay.create_table.unwrap_or(false),
            split: overlay.split.unwrap_or_default(),
            transactional: overlay.transactional.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.db.as_os_str().is_empty() {
            return Err(Error::Config("db cannot be empty".into()));
        }
        if self.folder.as_os_str().is_empty() {
            return Err(Error::Config("folder cannot be empty".into()));
        }
        validate_table_name(&self.table)
    }
}

/// The ledger table name is interpolated into SQL, so only plain identifiers
/// are accepted.
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("table cannot be empty".into()));
    }
    if name.len() > 128 {
        return Err(Error::Config("table name too long".into()));
    }

    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Config(format!(
            "invalid table name '{name}': use letters, digits and underscores"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay_with_db() -> ConfigOverlay {
        ConfigOverlay {
            db: Some(PathBuf::from("app.db")),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_unset_values() {
        let config = MigrateConfig::from_overlay(overlay_with_db()).unwrap();
        assert_eq!(config.folder, PathBuf::from(DEFAULT_FOLDER));
        assert_eq!(config.table, "migrations");
        assert!(!config.create_table);
        assert_eq!(config.split, SplitMode::Naive);
        assert!(!config.transactional);
    }

    #[test]
    fn missing_db_is_config_error() {
        let err = MigrateConfig::from_overlay(ConfigOverlay::default()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("db"));
    }

    #[test]
    fn empty_values_are_rejected() {
        let mut overlay = overlay_with_db();
        overlay.db = Some(PathBuf::new());
        assert!(MigrateConfig::from_overlay(overlay).is_err());

        let mut overlay = overlay_with_db();
        overlay.table = Some(String::new());
        assert!(MigrateConfig::from_overlay(overlay).is_err());

        let mut overlay = overlay_with_db();
        overlay.folder = Some(PathBuf::new());
        assert!(MigrateConfig::from_overlay(overlay).is_err());
    }

    #[test]
    fn table_names_must_be_identifiers() {
        assert!(validate_table_name("migrations").is_ok());
        assert!(validate_table_name("_schema_v2").is_ok());
        assert!(validate_table_name("2migrations").is_err());
        assert!(validate_table_name("migrations; DROP TABLE users").is_err());
        assert!(validate_table_name("schema.migrations").is_err());
        assert!(validate_table_name(&"a".repeat(129)).is_err());
    }

    #[test]
    fn later_overlay_wins() {
        let file = ConfigOverlay {
            db: Some(PathBuf::from("file.db")),
            table: Some("from_file".into()),
            create_table: Some(true),
            ..Default::default()
        };
        let flags = ConfigOverlay {
            table: Some("from_flags".into()),
            ..Default::default()
        };

        let merged = file.merge(flags);
        assert_eq!(merged.db, Some(PathBuf::from("file.db")));
        assert_eq!(merged.table.as_deref(), Some("from_flags"));
        assert_eq!(merged.create_table, Some(true));
    }

    #[test]
    fn split_mode_parses_case_insensitively() {
        assert_eq!("naive".parse::<SplitMode>().unwrap(), SplitMode::Naive);
        assert_eq!("AWARE".parse::<SplitMode>().unwrap(), SplitMode::Aware);
        assert!("smart".parse::<SplitMode>().is_err());
        assert_eq!(SplitMode::Aware.to_string(), "aware");
    }
}

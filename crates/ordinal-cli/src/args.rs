use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ordinal_config::{ConfigLoader, ConfigOverlay, MigrateConfig, SplitMode};

#[derive(Debug, Parser)]
#[command(name = "ordinal", version, about = "Apply ordered SQL migrations and keep a ledger of them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub migrate: MigrateArgs,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Apply every pending migration (default)
    Run,
    /// Show applied and pending migrations without changing anything
    Status {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct MigrateArgs {
    /// SQLite database file
    #[arg(long, env = "ORDINAL_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Folder holding <id>.sql migration files
    #[arg(long, env = "ORDINAL_FOLDER", global = true)]
    pub folder: Option<PathBuf>,

    /// Ledger table name
    #[arg(long, env = "ORDINAL_TABLE", global = true)]
    pub table: Option<String>,

    /// Create the ledger table if it does not exist
    #[arg(short = 'c', long = "create-table", global = true)]
    pub create_table: bool,

    /// Statement splitter: naive or aware
    #[arg(long, env = "ORDINAL_SPLIT", global = true)]
    pub split: Option<SplitMode>,

    /// Run each migration file inside its own transaction
    #[arg(long, global = true)]
    pub transactional: bool,

    /// YAML or TOML file with default settings
    #[arg(long, env = "ORDINAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl MigrateArgs {
    /// Settings given on the command line or through the environment. Boolean
    /// switches only override when set.
    pub fn overlay(&self) -> ConfigOverlay {
        ConfigOverlay {
            db: self.db.clone(),
            folder: self.folder.clone(),
            table: self.table.clone(),
            create_table: self.create_table.then_some(true),
            split: self.split,
            transactional: self.transactional.then_some(true),
        }
    }

    /// Layer flags over the optional config file and validate.
    pub fn resolve(&self) -> Result<MigrateConfig> {
        let base = match &self.config {
            Some(path) => ConfigLoader::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => ConfigOverlay::default(),
        };

        let config = MigrateConfig::from_overlay(base.merge(self.overlay()))?;
        Ok(config)
    }
}

use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use gemdb_types::RUBY_PLATFORM;

pub const DATABASE_ENV: &str = "GEMDB_DATABASE";
pub const WORKERS_ENV: &str = "GEMDB_WORKERS";

/// Database path that selects a throwaway in-memory store.
pub const MEMORY_DATABASE: &str = ":memory:";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GemDbConfig {
    /// SQLite file, or `:memory:`.
    pub database: String,
    /// Ingestion worker threads.
    pub workers: usize,
    /// Platform assumed for lookups that don't name one.
    pub default_platform: String,
}

impl Default for GemDbConfig {
    fn default() -> Self {
        Self {
            database: "gemdb.sqlite3".into(),
            workers: 4,
            default_platform: RUBY_PLATFORM.into(),
        }
    }
}

impl GemDbConfig {
    /// Read a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults, then the file if given, then the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(database) = var(DATABASE_ENV).filter(|v| !v.is_empty()) {
            self.database = database;
        }
        if let Some(workers) = var(WORKERS_ENV).filter(|v| !v.is_empty()) {
            self.workers = workers
                .parse()
                .with_context(|| format!("{WORKERS_ENV}={workers:?} is not a number"))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.database.is_empty() {
            bail!("database must not be empty");
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == MEMORY_DATABASE
    }
}

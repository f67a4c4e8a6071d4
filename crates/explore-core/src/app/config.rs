//! Config - 起動時の設定
//!
//! 環境変数（または JSON ファイル）から読み込む。未指定の項目は既定値。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Special database path selecting a private in-memory SQLite database.
pub const IN_MEMORY: &str = ":memory:";

/// How `PutDecision` resolves the first-to-like vs. reciprocal branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PutStrategy {
    /// Probe the reverse row, then write in a separate call. Two concurrent
    /// puts for the same pair may both take the first-to-like branch.
    #[default]
    ProbeThenWrite,

    /// Probe and write inside one ledger transaction.
    Atomic,
}

impl FromStr for PutStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "probe-then-write" => Ok(PutStrategy::ProbeThenWrite),
            "atomic" => Ok(PutStrategy::Atomic),
            other => Err(ConfigError::InvalidValue {
                key: "put_strategy",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutStrategy::ProbeThenWrite => f.write_str("probe-then-write"),
            PutStrategy::Atomic => f.write_str("atomic"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file, or `:memory:`.
    pub database_path: String,

    /// `tracing` filter directive, e.g. `info` or `explore_core=debug`.
    pub log_filter: String,

    pub put_strategy: PutStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "explore.db".to_string(),
            log_filter: "info".to_string(),
            put_strategy: PutStrategy::default(),
        }
    }
}

impl Config {
    /// Read from the process environment.
    ///
    /// - `EXPLORE_DATABASE_PATH`, falling back to `DATABASE_URL`
    ///   (an optional `sqlite://` prefix is stripped)
    /// - `RUST_LOG`
    /// - `EXPLORE_PUT_STRATEGY` (`probe-then-write` | `atomic`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = lookup("EXPLORE_DATABASE_PATH").or_else(|| lookup("DATABASE_URL")) {
            config.database_path = path
                .strip_prefix("sqlite://")
                .map(str::to_string)
                .unwrap_or(path);
        }
        if let Some(filter) = lookup("RUST_LOG") {
            config.log_filter = filter;
        }
        if let Some(strategy) = lookup("EXPLORE_PUT_STRATEGY") {
            config.put_strategy = strategy.parse()?;
        }
        Ok(config)
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path == IN_MEMORY
    }
}

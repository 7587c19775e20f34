//! Ledger configuration

use serde::{Deserialize, Serialize};

/// Configuration for the backing store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// SQLite connection URL (the file is created if missing)
    pub database_url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("CREATORLEDGER_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://creatorledger.db".to_string()),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

impl LedgerConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("CREATORLEDGER_DATABASE_URL")
                .unwrap_or(defaults.database_url),
            max_connections: std::env::var("CREATORLEDGER_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            busy_timeout_secs: std::env::var("CREATORLEDGER_BUSY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.busy_timeout_secs),
        }
    }

    /// Point the config at a specific database file
    pub fn with_database_url(url: impl Into<String>) -> Self {
        Self {
            database_url: url.into(),
            ..Self::default()
        }
    }
}

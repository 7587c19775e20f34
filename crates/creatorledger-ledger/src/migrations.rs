//! Schema migration runner
//!
//! A single integer lives in `schema_version`. On open, every migration
//! strictly greater than the stored version is applied in ascending
//! order, each inside its own transaction. Forward-only; there are no
//! down-migrations.

use crate::{LedgerError, LedgerResult};
use sqlx::SqlitePool;
use tracing::{debug, info};

struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create creators and ledger_events",
        statements: &[
            "CREATE TABLE creators (
                creator_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                public_key BLOB NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE ledger_events (
                creator_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                kind TEXT NOT NULL,
                payload BLOB NOT NULL,
                timestamp INTEGER NOT NULL,
                prev_hash BLOB NOT NULL,
                this_hash BLOB NOT NULL,
                signature BLOB NOT NULL,
                PRIMARY KEY (creator_id, seq)
            )",
            "CREATE INDEX idx_ledger_events_creator ON ledger_events (creator_id)",
        ],
    },
    Migration {
        version: 2,
        name: "add row_version for optimistic appends",
        statements: &[
            "ALTER TABLE creators ADD COLUMN row_version INTEGER NOT NULL DEFAULT 1",
            "ALTER TABLE ledger_events ADD COLUMN row_version INTEGER NOT NULL DEFAULT 1",
            "CREATE INDEX idx_ledger_events_tip ON ledger_events (creator_id, seq, row_version)",
        ],
    },
];

/// Bring the store up to the latest schema version
pub(crate) async fn run_migrations(pool: &SqlitePool) -> LedgerResult<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await?;

    let current: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;
    let current = current.unwrap_or(0);
    debug!(version = current, "stored schema version");

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(statement).execute(&mut *tx).await.map_err(|e| {
                LedgerError::Migration {
                    reason: format!("migration {:03}: {}", migration.version, e),
                }
            })?;
        }
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(
            version = migration.version,
            name = migration.name,
            "applied migration"
        );
    }

    Ok(())
}

/// Read the stored schema version (0 before any migration has run)
pub(crate) async fn schema_version(pool: &SqlitePool) -> LedgerResult<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

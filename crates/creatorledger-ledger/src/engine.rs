//! The append-only ledger engine

use crate::{migrations, LedgerConfig, LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use creatorledger_crypto::{generate_keypair, sha256, verify_bytes, PublicKey};
use creatorledger_proof::ProofBundle;
use creatorledger_types::{
    canonical_event_bytes, Creator, CreatorId, DisplayName, EventKind, LedgerEvent, ZERO_HASH,
};
use creatorledger_vault::{SecretVault, VaultError};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The highest-seq event of a creator's chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tip {
    pub seq: u64,
    pub this_hash: [u8; 32],
    pub row_version: i64,
}

/// Outcome of a whole-chain verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum ChainCheck {
    /// All invariants hold across `events` events
    Ok { events: u64 },
    /// The event at `seq` does not verify under the registered key
    BadSignature { seq: u64 },
    /// The chain has a gap, a mislinked hash, or a corrupt stored hash at `seq`
    BrokenChain { seq: u64 },
}

/// The ledger engine: owns the backing pool and the vault handle
///
/// Methods are safe to call from concurrent tasks; per-creator ordering
/// is enforced by the append protocol, not by any lock in here.
pub struct Ledger {
    pool: SqlitePool,
    vault: Arc<dyn SecretVault>,
}

impl Ledger {
    /// Open the backing store, apply pending migrations, and wrap the vault
    pub async fn open(config: &LedgerConfig, vault: Arc<dyn SecretVault>) -> LedgerResult<Self> {
        info!(url = %config.database_url, "opening ledger store");
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        migrations::run_migrations(&pool).await?;
        info!("ledger store ready");
        Ok(Self { pool, vault })
    }

    /// Handle to the backing pool (read-only use by callers)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The stored schema version
    pub async fn schema_version(&self) -> LedgerResult<i64> {
        migrations::schema_version(&self.pool).await
    }

    // ========================================================================
    // Creators
    // ========================================================================

    /// Mint a creator: generate a keypair, persist the public row, store
    /// the seed in the vault
    ///
    /// The row is inserted before the vault is touched, so a mint that
    /// loses a duplicate race never overwrites an existing secret. If
    /// the vault write fails the half-minted row is removed again.
    pub async fn create_creator(
        &self,
        creator_id: CreatorId,
        display_name: DisplayName,
    ) -> LedgerResult<Creator> {
        let (public, mut secret) = generate_keypair();
        let created_at = Utc::now();

        let inserted = sqlx::query(
            "INSERT INTO creators (creator_id, display_name, public_key, created_at, row_version)
             VALUES (?, ?, ?, ?, 1)",
        )
        .bind(creator_id.as_str())
        .bind(display_name.as_str())
        .bind(public.as_bytes().to_vec())
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(e) = inserted {
            secret.release();
            return Err(if is_unique_violation(&e) {
                LedgerError::DuplicateCreator {
                    creator_id: creator_id.to_string(),
                }
            } else {
                e.into()
            });
        }

        let stored = self.vault.store(&creator_id, &secret).await;
        secret.release();
        if let Err(e) = stored {
            // roll the half-minted row back so the mint can be retried
            let _ = sqlx::query("DELETE FROM creators WHERE creator_id = ?")
                .bind(creator_id.as_str())
                .execute(&self.pool)
                .await;
            return Err(e.into());
        }

        info!(creator = %creator_id, "minted creator");
        Ok(Creator {
            creator_id,
            display_name,
            public_key: public.to_string(),
            created_at,
            row_version: 1,
        })
    }

    /// Fetch a creator record
    pub async fn get_creator(&self, creator_id: &CreatorId) -> LedgerResult<Option<Creator>> {
        let row = sqlx::query(
            "SELECT creator_id, display_name, public_key, created_at, row_version
             FROM creators WHERE creator_id = ?",
        )
        .bind(creator_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| creator_from_row(&row)).transpose()
    }

    /// All creator records, ordered by id
    pub async fn list_creators(&self) -> LedgerResult<Vec<Creator>> {
        let rows = sqlx::query(
            "SELECT creator_id, display_name, public_key, created_at, row_version
             FROM creators ORDER BY creator_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(creator_from_row).collect()
    }

    /// Number of minted creators
    pub async fn creator_count(&self) -> LedgerResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM creators")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// The tip of a creator's chain, or `None` before the first append
    pub async fn get_tip(&self, creator_id: &CreatorId) -> LedgerResult<Option<Tip>> {
        let row = sqlx::query(
            "SELECT seq, this_hash, row_version FROM ledger_events
             WHERE creator_id = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(creator_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let seq: i64 = row.try_get("seq")?;
            Ok(Tip {
                seq: seq as u64,
                this_hash: blob32(row.try_get("this_hash")?, "this_hash")?,
                row_version: row.try_get("row_version")?,
            })
        })
        .transpose()
    }

    /// Append an event stamped with the current UTC second
    pub async fn append(
        &self,
        creator_id: &CreatorId,
        kind: EventKind,
        payload: &[u8],
    ) -> LedgerResult<LedgerEvent> {
        self.append_at(creator_id, kind, payload, Utc::now().timestamp())
            .await
    }

    /// Append an event with a caller-supplied timestamp
    ///
    /// One optimistic attempt: read the tip, compose and sign `seq + 1`,
    /// insert conditional on the tip not having moved. A lost race
    /// returns `concurrency-conflict`; retrying is the caller's call.
    pub async fn append_at(
        &self,
        creator_id: &CreatorId,
        kind: EventKind,
        payload: &[u8],
        timestamp: i64,
    ) -> LedgerResult<LedgerEvent> {
        let creator = self.get_creator(creator_id).await?.ok_or_else(|| {
            LedgerError::UnknownCreator {
                creator_id: creator_id.to_string(),
            }
        })?;
        let registered = PublicKey::parse(&creator.public_key)?;

        let mut secret = self.vault.retrieve(creator_id).await?.ok_or_else(|| {
            VaultError::Io {
                reason: format!("no stored secret for creator {}", creator_id),
            }
        })?;
        if secret.public_key()? != registered {
            secret.release();
            return Err(VaultError::Io {
                reason: "stored secret does not match the registered public key".to_string(),
            }
            .into());
        }

        let (prev_seq, prev_hash, prev_row_version) = match self.get_tip(creator_id).await? {
            Some(tip) => (tip.seq, tip.this_hash, tip.row_version),
            None => (0, ZERO_HASH, 0),
        };
        let seq = prev_seq + 1;

        let canonical = canonical_event_bytes(
            creator_id.as_str(),
            seq,
            kind.as_str(),
            timestamp,
            &prev_hash,
            payload,
        );
        let this_hash = sha256(&canonical);
        let signed = secret.sign(&canonical);
        secret.release();
        let signature = signed?;

        let event = LedgerEvent {
            creator_id: creator_id.clone(),
            seq,
            kind,
            payload: payload.to_vec(),
            timestamp,
            prev_hash,
            this_hash,
            signature: signature.as_bytes().to_vec(),
            row_version: prev_row_version + 1,
        };
        self.insert_event(&event).await?;
        debug!(creator = %creator_id, seq, "appended event");
        Ok(event)
    }

    /// Insert one composed event; exactly one row must be affected
    ///
    /// The `(creator_id, seq)` primary key is the optimistic predicate:
    /// everyone who read the same tip composes the same `seq`, and the
    /// unique index admits exactly one of them.
    async fn insert_event(&self, event: &LedgerEvent) -> LedgerResult<()> {
        let result = sqlx::query(
            "INSERT INTO ledger_events
             (creator_id, seq, kind, payload, timestamp, prev_hash, this_hash, signature, row_version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.creator_id.as_str())
        .bind(event.seq as i64)
        .bind(event.kind.as_str())
        .bind(event.payload.as_slice())
        .bind(event.timestamp)
        .bind(event.prev_hash.as_slice())
        .bind(event.this_hash.as_slice())
        .bind(event.signature.as_slice())
        .bind(event.row_version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(LedgerError::ConcurrencyConflict),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetch one event by sequence number
    pub async fn get_event(
        &self,
        creator_id: &CreatorId,
        seq: u64,
    ) -> LedgerResult<Option<LedgerEvent>> {
        let row = sqlx::query(
            "SELECT creator_id, seq, kind, payload, timestamp, prev_hash, this_hash, signature, row_version
             FROM ledger_events WHERE creator_id = ? AND seq = ?",
        )
        .bind(creator_id.as_str())
        .bind(seq as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| event_from_row(&row)).transpose()
    }

    /// Events in `[from_seq, to_seq]` (unbounded above when `to_seq` is
    /// `None`), ordered by `seq` ascending
    pub async fn list_events(
        &self,
        creator_id: &CreatorId,
        from_seq: u64,
        to_seq: Option<u64>,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        let rows = match to_seq {
            Some(to) => {
                sqlx::query(
                    "SELECT creator_id, seq, kind, payload, timestamp, prev_hash, this_hash, signature, row_version
                     FROM ledger_events WHERE creator_id = ? AND seq >= ? AND seq <= ?
                     ORDER BY seq ASC",
                )
                .bind(creator_id.as_str())
                .bind(from_seq as i64)
                .bind(to as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT creator_id, seq, kind, payload, timestamp, prev_hash, this_hash, signature, row_version
                     FROM ledger_events WHERE creator_id = ? AND seq >= ?
                     ORDER BY seq ASC",
                )
                .bind(creator_id.as_str())
                .bind(from_seq as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(event_from_row).collect()
    }

    /// Check I1 (contiguity), I2 (linkage), and I3 (signatures plus
    /// stored-hash integrity) across the whole chain
    pub async fn verify_chain(&self, creator_id: &CreatorId) -> LedgerResult<ChainCheck> {
        let creator = self.get_creator(creator_id).await?.ok_or_else(|| {
            LedgerError::UnknownCreator {
                creator_id: creator_id.to_string(),
            }
        })?;
        let public = PublicKey::parse(&creator.public_key)?;

        let events = self.list_events(creator_id, 1, None).await?;
        let mut prev_hash = ZERO_HASH;
        for (index, event) in events.iter().enumerate() {
            let expected = index as u64 + 1;
            if event.seq != expected {
                return Ok(ChainCheck::BrokenChain { seq: expected });
            }
            if event.prev_hash != prev_hash {
                return Ok(ChainCheck::BrokenChain { seq: event.seq });
            }

            let canonical = canonical_event_bytes(
                creator_id.as_str(),
                event.seq,
                event.kind.as_str(),
                event.timestamp,
                &event.prev_hash,
                &event.payload,
            );
            if !verify_bytes(&public, &canonical, &event.signature) {
                return Ok(ChainCheck::BadSignature { seq: event.seq });
            }
            if sha256(&canonical) != event.this_hash {
                return Ok(ChainCheck::BrokenChain { seq: event.seq });
            }

            prev_hash = event.this_hash;
        }

        Ok(ChainCheck::Ok {
            events: events.len() as u64,
        })
    }

    // ========================================================================
    // Proof bundles
    // ========================================================================

    /// Materialize an exportable proof of the chain prefix `1..=up_to`
    /// (the whole chain when `up_to` is `None`)
    pub async fn export_bundle(
        &self,
        creator_id: &CreatorId,
        up_to: Option<u64>,
    ) -> LedgerResult<ProofBundle> {
        let creator = self.get_creator(creator_id).await?.ok_or_else(|| {
            LedgerError::UnknownCreator {
                creator_id: creator_id.to_string(),
            }
        })?;
        let events = self.list_events(creator_id, 1, up_to).await?;
        Ok(ProofBundle::assemble(&creator, &events))
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation)
}

fn blob32(bytes: Vec<u8>, field: &str) -> LedgerResult<[u8; 32]> {
    bytes.try_into().map_err(|_| LedgerError::Corrupt {
        reason: format!("{} is not 32 bytes", field),
    })
}

fn creator_from_row(row: &sqlx::sqlite::SqliteRow) -> LedgerResult<Creator> {
    let public_key = blob32(row.try_get("public_key")?, "public_key")?;
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| LedgerError::Corrupt {
            reason: format!("created_at: {}", e),
        })?
        .with_timezone(&Utc);

    Ok(Creator {
        creator_id: CreatorId::new(row.try_get::<String, _>("creator_id")?)?,
        display_name: DisplayName::new(row.try_get::<String, _>("display_name")?)?,
        public_key: PublicKey::from_bytes(public_key).to_string(),
        created_at,
        row_version: row.try_get("row_version")?,
    })
}

fn event_from_row(row: &sqlx::sqlite::SqliteRow) -> LedgerResult<LedgerEvent> {
    let seq: i64 = row.try_get("seq")?;
    Ok(LedgerEvent {
        creator_id: CreatorId::new(row.try_get::<String, _>("creator_id")?)?,
        seq: seq as u64,
        kind: EventKind::new(row.try_get::<String, _>("kind")?)?,
        payload: row.try_get("payload")?,
        timestamp: row.try_get("timestamp")?,
        prev_hash: blob32(row.try_get("prev_hash")?, "prev_hash")?,
        this_hash: blob32(row.try_get("this_hash")?, "this_hash")?,
        signature: row.try_get("signature")?,
        row_version: row.try_get("row_version")?,
    })
}

//! CreatorLedger Engine - per-creator append-only provenance ledgers
//!
//! The engine owns the backing SQLite pool and maintains the ledger
//! invariants:
//!
//! 1. `seq` values per creator are 1..N contiguous with no gaps
//! 2. Every event's `prev_hash` equals the previous event's `this_hash`
//! 3. Every signature verifies under the creator's registered public key
//! 4. The store is append-only; no event is mutated after insertion
//!
//! Appends are optimistic: the engine reads the tip, composes and signs
//! the next event, and inserts it conditional on the tip not having
//! moved (enforced through the `(creator_id, seq)` primary key). A
//! losing appender gets a retryable `concurrency-conflict`; the engine
//! never retries internally, so callers choose their own backoff.

pub mod config;
pub mod engine;
mod migrations;

pub use config::LedgerConfig;
pub use engine::{ChainCheck, Ledger, Tip};

use creatorledger_crypto::CryptoError;
use creatorledger_types::TypesError;
use creatorledger_vault::VaultError;
use thiserror::Error;

/// Ledger engine errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Unknown creator: {creator_id}")]
    UnknownCreator { creator_id: String },

    #[error("Creator {creator_id} already exists")]
    DuplicateCreator { creator_id: String },

    #[error("Append raced against a concurrent writer; read the new tip and retry")]
    ConcurrencyConflict,

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration failed: {reason}")]
    Migration { reason: String },

    #[error("Corrupt ledger row: {reason}")]
    Corrupt { reason: String },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl LedgerError {
    /// Whether the caller may simply retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

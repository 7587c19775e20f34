//! Ledger event record

use crate::{CreatorId, Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `prev_hash` of the first event in every chain
pub const ZERO_HASH: [u8; 32] = [0u8; 32];

/// Maximum length of an event kind in bytes
pub const EVENT_KIND_MAX_LEN: usize = 64;

/// Category of a ledger event (e.g. "registered", "transferred")
///
/// Opaque to the engine. Control characters are rejected so a kind can
/// never collide with the canonical-bytes field terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventKind(String);

impl EventKind {
    /// Validate and construct an event kind
    pub fn new(kind: impl Into<String>) -> Result<Self> {
        let kind = kind.into();
        if kind.is_empty() {
            return Err(TypesError::InvalidEventKind {
                reason: "must not be empty".to_string(),
            });
        }
        if kind.len() > EVENT_KIND_MAX_LEN {
            return Err(TypesError::InvalidEventKind {
                reason: format!("exceeds {} bytes", EVENT_KIND_MAX_LEN),
            });
        }
        if kind.chars().any(|c| c.is_control()) {
            return Err(TypesError::InvalidEventKind {
                reason: "control characters not allowed".to_string(),
            });
        }
        Ok(Self(kind))
    }

    /// The kind as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for EventKind {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.0
    }
}

/// One signed, chained record in a creator's ledger
///
/// Invariants (maintained by the ledger engine, checked by verifiers):
/// 1. `seq` values per creator are 1..N contiguous with no gaps
/// 2. `prev_hash` equals the previous event's `this_hash` (`ZERO_HASH` at seq 1)
/// 3. `signature` verifies under the creator's public key over the canonical bytes
/// 4. Events are never mutated after insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub creator_id: CreatorId,
    /// 1-based, monotonically increasing, unique per creator
    pub seq: u64,
    pub kind: EventKind,
    /// Opaque payload bytes, canonicalised by the caller before appending
    pub payload: Vec<u8>,
    /// UTC seconds since the Unix epoch
    pub timestamp: i64,
    pub prev_hash: [u8; 32],
    pub this_hash: [u8; 32],
    /// 64-byte Ed25519 signature over the canonical bytes
    pub signature: Vec<u8>,
    pub row_version: i64,
}

//! Proof bundle wire model

use creatorledger_types::{Creator, LedgerEvent};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Current bundle format version
pub const BUNDLE_VERSION: u32 = 1;

/// A self-contained exportable proof of a prefix of a creator's chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub bundle_version: u32,
    pub creator_id: String,
    pub display_name: String,
    /// Canonical `ed25519:` string form
    pub public_key: String,
    /// Events from `seq = 1` upward, in order
    pub events: Vec<BundleEvent>,
}

/// One event as it travels inside a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEvent {
    pub seq: u64,
    pub kind: String,
    /// Standard base64 of the payload bytes
    pub payload: String,
    /// UTC seconds since the Unix epoch
    pub timestamp: i64,
    /// Lowercase hex of the 32-byte hash
    pub prev_hash: String,
    /// Lowercase hex of the 32-byte hash
    pub this_hash: String,
    /// Standard base64 of the 64-byte signature
    pub signature: String,
}

impl ProofBundle {
    /// Package a creator and an ordered prefix of their events
    pub fn assemble(creator: &Creator, events: &[LedgerEvent]) -> Self {
        Self {
            bundle_version: BUNDLE_VERSION,
            creator_id: creator.creator_id.to_string(),
            display_name: creator.display_name.to_string(),
            public_key: creator.public_key.clone(),
            events: events.iter().map(BundleEvent::from).collect(),
        }
    }

    /// Serialize to the stable JSON wire format
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse bundle bytes
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl From<&LedgerEvent> for BundleEvent {
    fn from(event: &LedgerEvent) -> Self {
        Self {
            seq: event.seq,
            kind: event.kind.to_string(),
            payload: BASE64.encode(&event.payload),
            timestamp: event.timestamp,
            prev_hash: hex::encode(event.prev_hash),
            this_hash: hex::encode(event.this_hash),
            signature: BASE64.encode(&event.signature),
        }
    }
}

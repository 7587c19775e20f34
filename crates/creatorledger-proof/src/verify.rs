//! Standalone bundle verification
//!
//! Takes only bundle bytes and reports a [`Verdict`]; parsing and I/O
//! failures are normalised into the verdict, never raised.

use crate::{BundleEvent, ProofBundle, BUNDLE_VERSION};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use creatorledger_crypto::{sha256, verify_bytes as verify_signature_bytes, PublicKey};
use creatorledger_types::{canonical_event_bytes, ZERO_HASH};
use serde::Serialize;
use std::path::Path;

/// Outcome of verifying a proof bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Every event chains and verifies under the embedded public key
    Ok,
    /// The bundle source could not be read (e.g. the file does not exist)
    InvalidInput,
    /// The event at `seq` does not verify under the embedded public key
    BadSignature { seq: u64 },
    /// The chain is out of order, has a gap, or mislinked hashes at `seq`
    BrokenChain { seq: u64 },
    /// The bytes are not a well-formed bundle
    MalformedBundle { reason: String },
}

impl Verdict {
    /// Whether the bundle verified clean
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }
}

/// Verify a bundle read from a filesystem path
pub fn verify_file(path: impl AsRef<Path>) -> Verdict {
    match std::fs::read(path) {
        Ok(bytes) => verify_bytes(&bytes),
        Err(_) => Verdict::InvalidInput,
    }
}

/// Verify raw bundle bytes
pub fn verify_bytes(bytes: &[u8]) -> Verdict {
    match ProofBundle::from_bytes(bytes) {
        Ok(bundle) => verify_bundle(&bundle),
        Err(e) => Verdict::MalformedBundle {
            reason: e.to_string(),
        },
    }
}

/// Verify a parsed bundle
pub fn verify_bundle(bundle: &ProofBundle) -> Verdict {
    if bundle.bundle_version != BUNDLE_VERSION {
        return Verdict::MalformedBundle {
            reason: format!("unsupported bundle version {}", bundle.bundle_version),
        };
    }

    let Some(public_key) = PublicKey::try_parse(&bundle.public_key) else {
        return Verdict::MalformedBundle {
            reason: "public key is not in canonical ed25519 form".to_string(),
        };
    };

    let mut prev_hash = ZERO_HASH;
    for (index, event) in bundle.events.iter().enumerate() {
        let expected_seq = index as u64 + 1;
        if event.seq != expected_seq {
            return Verdict::BrokenChain { seq: expected_seq };
        }

        let decoded = match DecodedEvent::decode(event) {
            Ok(decoded) => decoded,
            Err(reason) => {
                return Verdict::MalformedBundle {
                    reason: format!("event {}: {}", event.seq, reason),
                }
            }
        };

        if decoded.prev_hash != prev_hash {
            return Verdict::BrokenChain { seq: event.seq };
        }

        let canonical = canonical_event_bytes(
            &bundle.creator_id,
            event.seq,
            &event.kind,
            event.timestamp,
            &decoded.prev_hash,
            &decoded.payload,
        );
        if !verify_signature_bytes(&public_key, &canonical, &decoded.signature) {
            return Verdict::BadSignature { seq: event.seq };
        }
        if sha256(&canonical) != decoded.this_hash {
            return Verdict::BrokenChain { seq: event.seq };
        }

        prev_hash = decoded.this_hash;
    }

    Verdict::Ok
}

struct DecodedEvent {
    payload: Vec<u8>,
    prev_hash: [u8; 32],
    this_hash: [u8; 32],
    signature: Vec<u8>,
}

impl DecodedEvent {
    fn decode(event: &BundleEvent) -> Result<Self, String> {
        Ok(Self {
            payload: BASE64
                .decode(&event.payload)
                .map_err(|_| "payload is not base64")?,
            prev_hash: decode_hash(&event.prev_hash, "prev_hash")?,
            this_hash: decode_hash(&event.this_hash, "this_hash")?,
            signature: BASE64
                .decode(&event.signature)
                .map_err(|_| "signature is not base64")?,
        })
    }
}

fn decode_hash(encoded: &str, field: &str) -> Result<[u8; 32], String> {
    hex::decode(encoded)
        .map_err(|_| format!("{} is not hex", field))?
        .try_into()
        .map_err(|_| format!("{} is not 32 bytes", field))
}

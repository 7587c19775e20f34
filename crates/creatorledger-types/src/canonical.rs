//! Canonical signed-byte encoding
//!
//! The byte string over which both `this_hash` and `signature` are
//! computed. Producer and verifier must agree on this encoding exactly;
//! any deviation invalidates the chain.

/// Separator after the variable-length string fields
pub const FIELD_TERMINATOR: u8 = 0x1F;

/// Build the canonical byte string for one event
///
/// Layout, in order, with no other delimiters:
/// 1. `creator_id` UTF-8 bytes, terminated by `0x1F`
/// 2. `seq` as 8-byte big-endian unsigned integer
/// 3. `kind` UTF-8 bytes, terminated by `0x1F`
/// 4. `timestamp` as 8-byte big-endian signed integer
/// 5. `prev_hash` as 32 raw bytes
/// 6. `payload` length as 8-byte big-endian unsigned integer, then the payload
pub fn canonical_event_bytes(
    creator_id: &str,
    seq: u64,
    kind: &str,
    timestamp: i64,
    prev_hash: &[u8; 32],
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(creator_id.len() + kind.len() + payload.len() + 58);
    out.extend_from_slice(creator_id.as_bytes());
    out.push(FIELD_TERMINATOR);
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(kind.as_bytes());
    out.push(FIELD_TERMINATOR);
    out.extend_from_slice(&timestamp.to_be_bytes());
    out.extend_from_slice(prev_hash);
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

//! CreatorLedger Proof - self-contained offline attestations
//!
//! A proof bundle packages a creator's public identity with a prefix of
//! their event chain. Any party holding the bundle bytes can verify the
//! attestation with no server, no storage, and no vault: the verifier
//! is a pure function of the bundle bytes and the embedded public key.
//!
//! The wire format is JSON with a fixed field order (fields serialize
//! in declaration order), base64 payloads and signatures, and
//! lowercase-hex hashes, so serializing a given bundle value is
//! byte-stable.

pub mod bundle;
pub mod verify;

pub use bundle::{BundleEvent, ProofBundle, BUNDLE_VERSION};
pub use verify::{verify_bundle, verify_bytes, verify_file, Verdict};

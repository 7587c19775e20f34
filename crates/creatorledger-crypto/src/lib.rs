//! CreatorLedger Crypto - Ed25519 primitives for the provenance ledger
//!
//! This crate provides:
//! - Key generation and deterministic signing (RFC 8032)
//! - Non-throwing verification
//! - Canonical textual encodings for public keys and signatures
//! - SHA-256 hashing
//!
//! # Secret handling
//!
//! A [`SecretKey`] owns its 32-byte seed, zeroes it on release and on
//! drop, and fails with a lifecycle error on access after release. The
//! seed never appears in `Debug` output or error messages.

pub mod hash;
pub mod keys;
pub mod signature;

pub use hash::*;
pub use keys::*;
pub use signature::*;

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Invalid signature format: {0}")]
    InvalidSignatureFormat(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Secret key accessed after release")]
    SecretKeyReleased,
}

pub type CryptoResult<T> = Result<T, CryptoError>;

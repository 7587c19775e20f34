//! Ed25519 key material

use crate::{CryptoError, CryptoResult, Signature};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Prefix of the canonical public key string form
pub const PUBLIC_KEY_PREFIX: &str = "ed25519:";

/// An Ed25519 public key (32 bytes)
///
/// Canonical string form: `ed25519:` followed by standard base64 of the
/// raw bytes. Equality is byte equality; the bytes are not checked for
/// point validity here, so an off-curve encoding simply never verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Strict parse of the canonical string form
    pub fn parse(s: &str) -> CryptoResult<Self> {
        let encoded = s
            .strip_prefix(PUBLIC_KEY_PREFIX)
            .ok_or_else(|| CryptoError::InvalidKeyFormat("missing ed25519: prefix".to_string()))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidKeyFormat(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyFormat("key must be 32 bytes".to_string()))?;
        Ok(Self(bytes))
    }

    /// Parse that reports failure as `None` instead of an error
    pub fn try_parse(s: &str) -> Option<Self> {
        Self::parse(s).ok()
    }

    /// The raw key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub(crate) fn to_verifying_key(self) -> Option<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PUBLIC_KEY_PREFIX, BASE64.encode(self.0))
    }
}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> CryptoResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = CryptoError;

    fn try_from(s: String) -> CryptoResult<Self> {
        Self::parse(&s)
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_string()
    }
}

/// An Ed25519 secret seed (32 bytes)
///
/// The seed is secret material: it is never written to disk except via
/// the vault, the owned region is zeroed on release and on drop, and
/// access after release fails with a lifecycle error. Not `Clone`;
/// copies are opt-in through [`SecretKey::seed_bytes`].
pub struct SecretKey {
    seed: Box<[u8; 32]>,
    released: bool,
}

impl SecretKey {
    /// Generate a fresh secret key from the OS RNG
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        let key = Self::from_seed(seed);
        seed.zeroize();
        key
    }

    /// Restore a secret key from seed bytes
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            seed: Box::new(seed),
            released: false,
        }
    }

    /// Borrow the seed (fails after release)
    pub fn seed_bytes(&self) -> CryptoResult<&[u8; 32]> {
        if self.released {
            return Err(CryptoError::SecretKeyReleased);
        }
        Ok(&self.seed)
    }

    /// Derive the public key for this seed
    pub fn public_key(&self) -> CryptoResult<PublicKey> {
        let signing_key = SigningKey::from_bytes(self.seed_bytes()?);
        Ok(PublicKey(signing_key.verifying_key().to_bytes()))
    }

    /// Sign a message (deterministic per RFC 8032)
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Signature> {
        let signing_key = SigningKey::from_bytes(self.seed_bytes()?);
        let signature = signing_key
            .try_sign(message)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        Ok(Signature::from_bytes(signature.to_bytes()))
    }

    /// Zero the seed and mark the key released
    ///
    /// Idempotent. Subsequent accessors return a lifecycle error.
    pub fn release(&mut self) {
        self.seed.zeroize();
        self.released = true;
    }

    /// Whether the key has been released
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh keypair from the OS RNG
pub fn generate_keypair() -> (PublicKey, SecretKey) {
    let secret = SecretKey::generate();
    let signing_key = SigningKey::from_bytes(&secret.seed);
    let public = PublicKey(signing_key.verifying_key().to_bytes());
    (public, secret)
}

/// Derive the public key from a secret seed
pub fn derive_public(secret: &SecretKey) -> CryptoResult<PublicKey> {
    secret.public_key()
}

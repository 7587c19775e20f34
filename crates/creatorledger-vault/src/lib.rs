//! CreatorLedger Vault - OS-protected storage for creator signing seeds
//!
//! Four backends share one capability set `{store, retrieve, delete,
//! exists}`:
//! - [`FileVault`] - ciphertext files under a base directory, encrypted
//!   with the Windows user-scoped data-protection API
//! - [`SecretServiceVault`] - the freedesktop secret service, driven
//!   through `secret-tool`
//! - [`KeychainVault`] - the macOS keychain, driven through `security`
//! - [`MemoryVault`] - an in-process map, NOT SECURE, for tests and
//!   headless CI
//!
//! The [`factory::open_vault`] entry point routes `Auto` requests by the
//! current OS and rejects explicit requests that do not match it.
//!
//! Raw output of the external credential tools never escapes this crate;
//! failures are folded into short `vault-io` reasons.

pub mod factory;
pub mod file;
pub mod keychain;
pub mod memory;
pub mod secret_service;

pub use factory::{open_vault, VaultKind};
pub use file::{FileVault, SeedCipher};
pub use keychain::KeychainVault;
pub use memory::MemoryVault;
pub use secret_service::SecretServiceVault;

use async_trait::async_trait;
use creatorledger_crypto::{CryptoError, SecretKey};
use creatorledger_types::CreatorId;
use thiserror::Error;

/// Logical service name under which secrets are filed in OS credential stores
pub const SERVICE_NAME: &str = "CreatorLedger";

/// Vault errors
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Path {path} escapes vault base {base}")]
    PathTraversal { path: String, base: String },

    #[error("Vault not supported on this platform: {reason}")]
    PlatformNotSupported { reason: String },

    #[error("Credential store interaction failed: {reason}")]
    Io { reason: String },

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl VaultError {
    pub(crate) fn io(reason: impl Into<String>) -> Self {
        Self::Io {
            reason: reason.into(),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

/// Capability set shared by every vault backend
///
/// `store` is idempotent: storing over an existing slot replaces it
/// atomically from the caller's point of view. `retrieve` returns a
/// fresh owned secret each call; the caller releases it.
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Persist a creator's signing seed
    async fn store(&self, creator_id: &CreatorId, secret: &SecretKey) -> VaultResult<()>;

    /// Fetch a creator's signing seed, or `None` if absent
    async fn retrieve(&self, creator_id: &CreatorId) -> VaultResult<Option<SecretKey>>;

    /// Remove a creator's seed; returns whether one existed
    async fn delete(&self, creator_id: &CreatorId) -> VaultResult<bool>;

    /// Whether a seed is stored for this creator
    async fn exists(&self, creator_id: &CreatorId) -> VaultResult<bool>;
}

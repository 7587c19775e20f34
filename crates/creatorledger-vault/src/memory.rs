//! In-process vault backend
//!
//! **NOT SECURE.** Seeds live in process memory and do not persist.
//! Intended for tests, headless CI, and the factory's fallback on
//! platforms without a credential store.

use crate::{SecretVault, VaultError, VaultResult};
use async_trait::async_trait;
use creatorledger_crypto::SecretKey;
use creatorledger_types::CreatorId;
use std::collections::HashMap;
use std::sync::RwLock;
use zeroize::Zeroize;

/// In-memory vault keyed by creator id
pub struct MemoryVault {
    seeds: RwLock<HashMap<CreatorId, [u8; 32]>>,
}

impl MemoryVault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self {
            seeds: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryVault {
    fn drop(&mut self) {
        if let Ok(mut seeds) = self.seeds.write() {
            for seed in seeds.values_mut() {
                seed.zeroize();
            }
        }
    }
}

#[async_trait]
impl SecretVault for MemoryVault {
    async fn store(&self, creator_id: &CreatorId, secret: &SecretKey) -> VaultResult<()> {
        let seed = *secret.seed_bytes()?;
        let mut seeds = self
            .seeds
            .write()
            .map_err(|_| VaultError::io("vault lock poisoned"))?;
        if let Some(mut old) = seeds.insert(creator_id.clone(), seed) {
            old.zeroize();
        }
        Ok(())
    }

    async fn retrieve(&self, creator_id: &CreatorId) -> VaultResult<Option<SecretKey>> {
        let seeds = self
            .seeds
            .read()
            .map_err(|_| VaultError::io("vault lock poisoned"))?;
        Ok(seeds.get(creator_id).map(|seed| SecretKey::from_seed(*seed)))
    }

    async fn delete(&self, creator_id: &CreatorId) -> VaultResult<bool> {
        let mut seeds = self
            .seeds
            .write()
            .map_err(|_| VaultError::io("vault lock poisoned"))?;
        match seeds.remove(creator_id) {
            Some(mut seed) => {
                seed.zeroize();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn exists(&self, creator_id: &CreatorId) -> VaultResult<bool> {
        let seeds = self
            .seeds
            .read()
            .map_err(|_| VaultError::io("vault lock poisoned"))?;
        Ok(seeds.contains_key(creator_id))
    }
}

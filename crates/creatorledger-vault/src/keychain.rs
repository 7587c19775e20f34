//! macOS vault backend over the login keychain
//!
//! Drives the `security` CLI with argument arrays. Exit code 44
//! ("item not found") is treated as "absent" on lookup and delete,
//! never as a failure. Same base64 seed envelope as the Linux backend.

use crate::secret_service::{decode_seed, encode_seed, fold_reason};
use crate::{SecretVault, VaultError, VaultResult, SERVICE_NAME};
use async_trait::async_trait;
use creatorledger_crypto::SecretKey;
use creatorledger_types::CreatorId;
use std::process::Stdio;
use tokio::process::Command;
use zeroize::Zeroize;

const TOOL: &str = "security";

/// `security(1)` exit status for "the specified item could not be found"
const NOT_FOUND: i32 = 44;

/// Vault backend keyed on `(service, account)` in the keychain
pub struct KeychainVault {
    _private: (),
}

impl KeychainVault {
    /// Probe for `security` and construct the vault
    pub async fn new() -> VaultResult<Self> {
        match Command::new(TOOL)
            .arg("help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(_) => Ok(Self { _private: () }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VaultError::PlatformNotSupported {
                    reason: format!("{} not found on PATH", TOOL),
                })
            }
            Err(e) => Err(VaultError::io(format!("cannot probe {}: {}", TOOL, e))),
        }
    }

    async fn find(&self, creator_id: &CreatorId) -> VaultResult<Option<String>> {
        let output = Command::new(TOOL)
            .args([
                "find-generic-password",
                "-s",
                SERVICE_NAME,
                "-a",
                creator_id.as_str(),
                "-w",
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VaultError::io(format!("cannot run {}: {}", TOOL, e)))?;

        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            Some(NOT_FOUND) => Ok(None),
            _ => Err(VaultError::io(format!(
                "{} find-generic-password failed: {}",
                TOOL,
                fold_reason(&output.stderr)
            ))),
        }
    }
}

#[async_trait]
impl SecretVault for KeychainVault {
    async fn store(&self, creator_id: &CreatorId, secret: &SecretKey) -> VaultResult<()> {
        let mut encoded = encode_seed(secret)?;

        // -U updates an existing item in place, keeping store idempotent
        let output = Command::new(TOOL)
            .args([
                "add-generic-password",
                "-s",
                SERVICE_NAME,
                "-a",
                creator_id.as_str(),
                "-w",
                &encoded,
                "-U",
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VaultError::io(format!("cannot run {}: {}", TOOL, e)));
        encoded.zeroize();

        let output = output?;
        if !output.status.success() {
            return Err(VaultError::io(format!(
                "{} add-generic-password failed: {}",
                TOOL,
                fold_reason(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn retrieve(&self, creator_id: &CreatorId) -> VaultResult<Option<SecretKey>> {
        match self.find(creator_id).await? {
            Some(mut encoded) => {
                let decoded = decode_seed(&encoded);
                encoded.zeroize();
                let mut seed = decoded?;
                let secret = SecretKey::from_seed(seed);
                seed.zeroize();
                Ok(Some(secret))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, creator_id: &CreatorId) -> VaultResult<bool> {
        let output = Command::new(TOOL)
            .args([
                "delete-generic-password",
                "-s",
                SERVICE_NAME,
                "-a",
                creator_id.as_str(),
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VaultError::io(format!("cannot run {}: {}", TOOL, e)))?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(NOT_FOUND) => Ok(false),
            _ => Err(VaultError::io(format!(
                "{} delete-generic-password failed: {}",
                TOOL,
                fold_reason(&output.stderr)
            ))),
        }
    }

    async fn exists(&self, creator_id: &CreatorId) -> VaultResult<bool> {
        Ok(self.find(creator_id).await?.is_some())
    }
}

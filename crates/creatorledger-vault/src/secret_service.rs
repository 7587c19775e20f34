//! Linux vault backend over the freedesktop secret service
//!
//! Drives the `secret-tool` CLI with argument arrays (creator ids are
//! never interpolated into a shell string). Secrets travel as base64 of
//! the 32-byte seed: written to the tool's stdin on store, read from
//! its stdout on lookup. Tool output is folded into short error
//! reasons; it is never surfaced raw.

use crate::{SecretVault, VaultError, VaultResult, SERVICE_NAME};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use creatorledger_crypto::SecretKey;
use creatorledger_types::CreatorId;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use zeroize::Zeroize;

const TOOL: &str = "secret-tool";

/// Vault backend keyed on `(service, account)` in the secret service
pub struct SecretServiceVault {
    _private: (),
}

impl SecretServiceVault {
    /// Probe for `secret-tool` and construct the vault
    ///
    /// A missing tool fails with `platform-not-supported`, which the
    /// factory's `auto` mode downgrades to an in-memory fallback.
    pub async fn new() -> VaultResult<Self> {
        match Command::new(TOOL)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            // the bare invocation exits non-zero with usage; spawning is enough
            Ok(_) => Ok(Self { _private: () }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VaultError::PlatformNotSupported {
                    reason: format!("{} not found on PATH", TOOL),
                })
            }
            Err(e) => Err(VaultError::io(format!("cannot probe {}: {}", TOOL, e))),
        }
    }

    async fn lookup(&self, creator_id: &CreatorId) -> VaultResult<Option<[u8; 32]>> {
        let output = Command::new(TOOL)
            .args([
                "lookup",
                "service",
                SERVICE_NAME,
                "account",
                creator_id.as_str(),
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VaultError::io(format!("cannot run {}: {}", TOOL, e)))?;

        match output.status.code() {
            Some(0) => {
                let mut encoded = String::from_utf8_lossy(&output.stdout).trim().to_string();
                let seed = decode_seed(&encoded);
                encoded.zeroize();
                seed.map(Some)
            }
            Some(1) => Ok(None),
            _ => Err(VaultError::io(format!(
                "{} lookup failed: {}",
                TOOL,
                fold_reason(&output.stderr)
            ))),
        }
    }
}

#[async_trait]
impl SecretVault for SecretServiceVault {
    async fn store(&self, creator_id: &CreatorId, secret: &SecretKey) -> VaultResult<()> {
        let mut encoded = encode_seed(secret)?;

        let mut child = Command::new(TOOL)
            .args([
                "store",
                "--label",
                SERVICE_NAME,
                "service",
                SERVICE_NAME,
                "account",
                creator_id.as_str(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VaultError::io(format!("cannot run {}: {}", TOOL, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            let write = stdin.write_all(encoded.as_bytes()).await;
            drop(stdin);
            if let Err(e) = write {
                encoded.zeroize();
                return Err(VaultError::io(format!("cannot hand secret to {}: {}", TOOL, e)));
            }
        }
        encoded.zeroize();

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| VaultError::io(format!("{} did not finish: {}", TOOL, e)))?;
        if !output.status.success() {
            return Err(VaultError::io(format!(
                "{} store failed: {}",
                TOOL,
                fold_reason(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn retrieve(&self, creator_id: &CreatorId) -> VaultResult<Option<SecretKey>> {
        match self.lookup(creator_id).await? {
            Some(mut seed) => {
                let secret = SecretKey::from_seed(seed);
                seed.zeroize();
                Ok(Some(secret))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, creator_id: &CreatorId) -> VaultResult<bool> {
        if self.lookup(creator_id).await?.is_none() {
            return Ok(false);
        }

        let output = Command::new(TOOL)
            .args([
                "clear",
                "service",
                SERVICE_NAME,
                "account",
                creator_id.as_str(),
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| VaultError::io(format!("cannot run {}: {}", TOOL, e)))?;
        if !output.status.success() {
            return Err(VaultError::io(format!(
                "{} clear failed: {}",
                TOOL,
                fold_reason(&output.stderr)
            )));
        }
        Ok(true)
    }

    async fn exists(&self, creator_id: &CreatorId) -> VaultResult<bool> {
        Ok(self.lookup(creator_id).await?.is_some())
    }
}

/// Base64 envelope handed to the credential tools
pub(crate) fn encode_seed(secret: &SecretKey) -> VaultResult<String> {
    Ok(BASE64.encode(secret.seed_bytes()?))
}

/// Decode the base64 envelope back into a seed
pub(crate) fn decode_seed(encoded: &str) -> VaultResult<[u8; 32]> {
    let mut bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| VaultError::io("credential store returned a non-base64 secret"))?;
    let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        VaultError::io("credential store secret is not a 32-byte seed")
    })?;
    bytes.zeroize();
    Ok(seed)
}

/// Compress tool stderr into a short single-line reason
pub(crate) fn fold_reason(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut reason: String = line.chars().take(120).collect();
    if reason.is_empty() {
        reason = "no diagnostic output".to_string();
    }
    reason
}

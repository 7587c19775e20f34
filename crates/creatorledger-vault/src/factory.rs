//! Vault selection
//!
//! `Auto` routes by the current OS; explicit requests must match it.
//! Unknown platforms and a Linux host without `secret-tool` fall back
//! to the in-memory vault with a logged warning.

use crate::{
    KeychainVault, MemoryVault, SecretServiceVault, SecretVault, VaultError, VaultResult,
};
use std::str::FromStr;
use tracing::{info, warn};

/// Which vault backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultKind {
    /// Pick by the current OS
    Auto,
    /// Encrypted key files (Windows data protection)
    File,
    /// freedesktop secret service via `secret-tool` (Linux)
    SecretService,
    /// macOS keychain via `security`
    Keychain,
    /// In-process map; NOT SECURE
    Memory,
}

impl FromStr for VaultKind {
    type Err = VaultError;

    fn from_str(s: &str) -> VaultResult<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "file" => Ok(Self::File),
            "secret-service" => Ok(Self::SecretService),
            "keychain" => Ok(Self::Keychain),
            "memory" => Ok(Self::Memory),
            other => Err(VaultError::PlatformNotSupported {
                reason: format!("unknown vault kind {:?}", other),
            }),
        }
    }
}

/// Open a vault backend
pub async fn open_vault(kind: VaultKind) -> VaultResult<Box<dyn SecretVault>> {
    match kind {
        VaultKind::Auto => open_auto().await,
        VaultKind::Memory => {
            warn!("using the in-memory vault; secrets will NOT persist");
            Ok(Box::new(MemoryVault::new()))
        }
        VaultKind::File => open_file(),
        VaultKind::SecretService => open_secret_service().await,
        VaultKind::Keychain => open_keychain().await,
    }
}

async fn open_auto() -> VaultResult<Box<dyn SecretVault>> {
    match std::env::consts::OS {
        "windows" => open_file(),
        "linux" => match SecretServiceVault::new().await {
            Ok(vault) => {
                info!("vault: secret service");
                Ok(Box::new(vault))
            }
            Err(VaultError::PlatformNotSupported { reason }) => {
                warn!(%reason, "secret service unavailable; falling back to in-memory vault");
                Ok(Box::new(MemoryVault::new()))
            }
            Err(e) => Err(e),
        },
        "macos" => open_keychain().await,
        other => {
            warn!(os = other, "no vault backend for this OS; using in-memory vault");
            Ok(Box::new(MemoryVault::new()))
        }
    }
}

fn open_file() -> VaultResult<Box<dyn SecretVault>> {
    #[cfg(windows)]
    {
        let vault = crate::FileVault::open_default()?;
        info!(base = %vault.base().display(), "vault: encrypted key files");
        Ok(Box::new(vault))
    }
    #[cfg(not(windows))]
    {
        Err(VaultError::PlatformNotSupported {
            reason: "the file vault needs Windows user-scoped data protection".to_string(),
        })
    }
}

async fn open_secret_service() -> VaultResult<Box<dyn SecretVault>> {
    if !cfg!(target_os = "linux") {
        return Err(VaultError::PlatformNotSupported {
            reason: "the secret-service vault is Linux-only".to_string(),
        });
    }
    let vault = SecretServiceVault::new().await?;
    info!("vault: secret service");
    Ok(Box::new(vault))
}

async fn open_keychain() -> VaultResult<Box<dyn SecretVault>> {
    if !cfg!(target_os = "macos") {
        return Err(VaultError::PlatformNotSupported {
            reason: "the keychain vault is macOS-only".to_string(),
        });
    }
    let vault = KeychainVault::new().await?;
    info!("vault: keychain");
    Ok(Box::new(vault))
}

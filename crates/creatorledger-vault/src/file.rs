//! File-backed vault with OS-bound encryption (the Windows backend)
//!
//! Each seed is encrypted by a [`SeedCipher`] and written to
//! `{base}/{creator_id}.key`. On Windows the cipher is the user-scoped
//! data-protection API, so the files are opaque outside the user's
//! session. The path of every key file is checked to lie inside the
//! vault base before any I/O.

use crate::{SecretVault, VaultError, VaultResult};
use async_trait::async_trait;
use creatorledger_crypto::SecretKey;
use creatorledger_types::CreatorId;
use std::path::{Component, Path, PathBuf};
use zeroize::Zeroize;

/// Encrypts seeds before they reach disk
///
/// The production implementation is the Windows data-protection API;
/// tests inject their own cipher so the file handling runs on any OS.
pub trait SeedCipher: Send + Sync {
    fn encrypt(&self, seed: &[u8; 32]) -> VaultResult<Vec<u8>>;
    fn decrypt(&self, ciphertext: &[u8]) -> VaultResult<[u8; 32]>;
}

/// Vault backend storing one ciphertext file per creator
pub struct FileVault {
    base: PathBuf,
    cipher: Box<dyn SeedCipher>,
}

impl FileVault {
    /// Open a vault over `{base}` with an injected cipher
    ///
    /// A relative base is anchored at the current working directory so
    /// containment checks compare absolute paths.
    pub fn with_cipher(base: impl Into<PathBuf>, cipher: Box<dyn SeedCipher>) -> VaultResult<Self> {
        let base = base.into();
        let base = if base.is_absolute() {
            base
        } else {
            std::env::current_dir()
                .map_err(|e| VaultError::io(format!("cannot resolve working directory: {}", e)))?
                .join(base)
        };
        Ok(Self {
            base: normalize(&base),
            cipher,
        })
    }

    /// Open a vault in the default per-user location with DPAPI encryption
    #[cfg(windows)]
    pub fn open_default() -> VaultResult<Self> {
        let base = default_base_dir()?;
        Self::with_cipher(base, Box::new(dpapi::DpapiCipher))
    }

    /// Open a vault over `{base}` with DPAPI encryption
    #[cfg(windows)]
    pub fn open_at(base: impl Into<PathBuf>) -> VaultResult<Self> {
        Self::with_cipher(base, Box::new(dpapi::DpapiCipher))
    }

    /// The normalized base directory
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn key_path(&self, creator_id: &CreatorId) -> VaultResult<PathBuf> {
        contained_key_path(&self.base, creator_id.as_str())
    }
}

/// Default vault directory under the per-user local data dir
pub fn default_base_dir() -> VaultResult<PathBuf> {
    dirs_next::data_local_dir()
        .map(|dir| dir.join("creatorledger").join("keys"))
        .ok_or_else(|| VaultError::io("no per-user data directory on this system"))
}

/// Resolve `{base}/{name}.key` and reject anything that escapes the base
///
/// `CreatorId`'s charset already forbids separators; this check stays as
/// a second line before any I/O happens.
fn contained_key_path(base: &Path, name: &str) -> VaultResult<PathBuf> {
    let candidate = normalize(&base.join(format!("{}.key", name)));
    if !candidate.starts_with(base) {
        return Err(VaultError::PathTraversal {
            path: candidate.display().to_string(),
            base: base.display().to_string(),
        });
    }
    Ok(candidate)
}

/// Lexically normalize a path: resolve `.` and `..` without touching the
/// filesystem (the target file may not exist yet)
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // parent of the root is the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl SecretVault for FileVault {
    async fn store(&self, creator_id: &CreatorId, secret: &SecretKey) -> VaultResult<()> {
        let path = self.key_path(creator_id)?;
        let ciphertext = self.cipher.encrypt(secret.seed_bytes()?)?;

        tokio::fs::create_dir_all(&self.base)
            .await
            .map_err(|e| VaultError::io(format!("cannot create vault directory: {}", e)))?;

        // Write-then-rename so a replace is atomic for readers
        let tmp = path.with_extension("key.tmp");
        tokio::fs::write(&tmp, &ciphertext)
            .await
            .map_err(|e| VaultError::io(format!("cannot write key file: {}", e)))?;
        restrict_permissions(&tmp)
            .await
            .map_err(|e| VaultError::io(format!("cannot restrict key file permissions: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| VaultError::io(format!("cannot finalize key file: {}", e)))?;
        Ok(())
    }

    async fn retrieve(&self, creator_id: &CreatorId) -> VaultResult<Option<SecretKey>> {
        let path = self.key_path(creator_id)?;
        let ciphertext = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(VaultError::io(format!("cannot read key file: {}", e))),
        };
        let mut seed = self.cipher.decrypt(&ciphertext)?;
        let secret = SecretKey::from_seed(seed);
        seed.zeroize();
        Ok(Some(secret))
    }

    async fn delete(&self, creator_id: &CreatorId) -> VaultResult<bool> {
        let path = self.key_path(creator_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VaultError::io(format!("cannot remove key file: {}", e))),
        }
    }

    async fn exists(&self, creator_id: &CreatorId) -> VaultResult<bool> {
        let path = self.key_path(creator_id)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(VaultError::io(format!("cannot stat key file: {}", e))),
        }
    }
}

/// Windows user-scoped data protection (DPAPI)
#[cfg(windows)]
mod dpapi {
    use super::SeedCipher;
    use crate::{VaultError, VaultResult};
    use std::ptr;
    use winapi::um::dpapi::{CryptProtectData, CryptUnprotectData, CRYPTPROTECT_UI_FORBIDDEN};
    use winapi::um::winbase::LocalFree;
    use winapi::um::wincrypt::DATA_BLOB;

    pub struct DpapiCipher;

    fn protect(input: &[u8], decrypt: bool) -> VaultResult<Vec<u8>> {
        let mut in_blob = DATA_BLOB {
            cbData: input.len() as u32,
            pbData: input.as_ptr() as *mut u8,
        };
        let mut out_blob = DATA_BLOB {
            cbData: 0,
            pbData: ptr::null_mut(),
        };

        let ok = unsafe {
            if decrypt {
                CryptUnprotectData(
                    &mut in_blob,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    CRYPTPROTECT_UI_FORBIDDEN,
                    &mut out_blob,
                )
            } else {
                CryptProtectData(
                    &mut in_blob,
                    ptr::null(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    CRYPTPROTECT_UI_FORBIDDEN,
                    &mut out_blob,
                )
            }
        };
        if ok == 0 {
            return Err(VaultError::io(if decrypt {
                "data protection decrypt failed"
            } else {
                "data protection encrypt failed"
            }));
        }

        let bytes = unsafe {
            std::slice::from_raw_parts(out_blob.pbData, out_blob.cbData as usize).to_vec()
        };
        unsafe {
            LocalFree(out_blob.pbData as *mut _);
        }
        Ok(bytes)
    }

    impl SeedCipher for DpapiCipher {
        fn encrypt(&self, seed: &[u8; 32]) -> VaultResult<Vec<u8>> {
            protect(seed, false)
        }

        fn decrypt(&self, ciphertext: &[u8]) -> VaultResult<[u8; 32]> {
            let plain = protect(ciphertext, true)?;
            plain
                .try_into()
                .map_err(|_| VaultError::io("protected key file does not hold a 32-byte seed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creatorledger_crypto::generate_keypair;
    use tempfile::tempdir;

    /// Reversible stand-in for the OS cipher; NOT an actual cipher
    struct XorCipher(u8);

    impl SeedCipher for XorCipher {
        fn encrypt(&self, seed: &[u8; 32]) -> VaultResult<Vec<u8>> {
            Ok(seed.iter().map(|b| b ^ self.0).collect())
        }

        fn decrypt(&self, ciphertext: &[u8]) -> VaultResult<[u8; 32]> {
            let bytes: Vec<u8> = ciphertext.iter().map(|b| b ^ self.0).collect();
            bytes
                .try_into()
                .map_err(|_| VaultError::io("bad ciphertext length"))
        }
    }

    fn vault_at(base: &Path) -> FileVault {
        FileVault::with_cipher(base, Box::new(XorCipher(0x5A))).unwrap()
    }

    fn creator(id: &str) -> CreatorId {
        CreatorId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_store_retrieve_delete() {
        let dir = tempdir().unwrap();
        let vault = vault_at(dir.path());
        let id = creator("alice");
        let (public, secret) = generate_keypair();

        vault.store(&id, &secret).await.unwrap();
        assert!(vault.exists(&id).await.unwrap());
        assert!(dir.path().join("alice.key").exists());

        let restored = vault.retrieve(&id).await.unwrap().unwrap();
        assert_eq!(restored.public_key().unwrap(), public);

        assert!(vault.delete(&id).await.unwrap());
        assert!(!vault.delete(&id).await.unwrap());
        assert!(vault.retrieve(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_replaces_existing_slot() {
        let dir = tempdir().unwrap();
        let vault = vault_at(dir.path());
        let id = creator("alice");
        let (_, first) = generate_keypair();
        let (second_public, second) = generate_keypair();

        vault.store(&id, &first).await.unwrap();
        vault.store(&id, &second).await.unwrap();

        let restored = vault.retrieve(&id).await.unwrap().unwrap();
        assert_eq!(restored.public_key().unwrap(), second_public);
    }

    #[tokio::test]
    async fn test_ciphertext_on_disk_is_not_the_seed() {
        let dir = tempdir().unwrap();
        let vault = vault_at(dir.path());
        let id = creator("alice");
        let (_, secret) = generate_keypair();
        let seed = *secret.seed_bytes().unwrap();

        vault.store(&id, &secret).await.unwrap();
        let on_disk = std::fs::read(dir.path().join("alice.key")).unwrap();
        assert_ne!(on_disk, seed.to_vec());
    }

    #[test]
    fn test_traversal_id_rejected_before_any_io() {
        // The id charset blocks separators at construction time
        assert!(CreatorId::new("../evil").is_err());
        assert!(CreatorId::new("a/b").is_err());
    }

    #[test]
    fn test_contained_key_path_defensive_check() {
        let base = normalize(Path::new("/srv/vault"));
        assert!(contained_key_path(&base, "alice").is_ok());
        assert!(matches!(
            contained_key_path(&base, "../evil"),
            Err(VaultError::PathTraversal { .. })
        ));
        assert!(matches!(
            contained_key_path(&base, "../../etc/passwd"),
            Err(VaultError::PathTraversal { .. })
        ));
    }

    #[test]
    fn test_normalize_collapses_dots() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[tokio::test]
    async fn test_dotted_base_still_contains_keys() {
        let dir = tempdir().unwrap();
        let dotted = dir.path().join("keys").join("..").join("keys");
        let vault = vault_at(&dotted);
        let id = creator("alice");
        let (_, secret) = generate_keypair();

        vault.store(&id, &secret).await.unwrap();
        assert!(dir.path().join("keys").join("alice.key").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_key_file_is_user_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let vault = vault_at(dir.path());
        let (_, secret) = generate_keypair();
        vault.store(&creator("alice"), &secret).await.unwrap();

        let mode = std::fs::metadata(dir.path().join("alice.key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

//! Encrypted photo vault
//!
//! Filesystem-backed blob store with AES-256-GCM encryption at rest. The
//! per-vault master key is generated on first use and persisted beside the
//! photo directory (mode 0600 on Unix) so stored photos remain recoverable
//! for later comparison. Each photo gets a fresh random 96-bit nonce,
//! stored in a sidecar envelope with the ciphertext.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use kidcheck_common::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

const MASTER_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Opaque handle to an encrypted photo blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef(String);

impl PhotoRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encrypt-at-rest photo storage primitive.
///
/// Injected behind a trait so tests can substitute deterministic stores and
/// production can back it with a remote blob service.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Encrypt and store a photo blob, returning an opaque reference
    async fn store(&self, blob: &[u8], label: &str) -> Result<PhotoRef>;

    /// Decrypt and load a previously stored photo
    async fn load(&self, photo_ref: &PhotoRef) -> Result<Vec<u8>>;

    /// Delete a stored photo. Deleting an already-deleted reference is a no-op.
    async fn delete(&self, photo_ref: &PhotoRef) -> Result<()>;
}

/// On-disk envelope holding one encrypted photo
#[derive(Debug, Serialize, Deserialize)]
struct PhotoEnvelope {
    nonce_b64: String,
    ciphertext_b64: String,
}

/// Filesystem-backed [`PhotoStore`] implementation
#[derive(Debug, Clone)]
pub struct EncryptedPhotoVault {
    root: PathBuf,
    key_path: PathBuf,
}

impl EncryptedPhotoVault {
    /// Create a vault rooted at `root`; the directory and master key are
    /// created lazily on first store
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let key_path = root.join("master.key");
        Self { root, key_path }
    }

    fn photo_path(&self, photo_ref: &PhotoRef) -> Result<PathBuf> {
        let name = photo_ref.as_str();
        // References are bare file names; anything else is not ours
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(Error::InvalidInput(format!(
                "Invalid photo reference: {}",
                name
            )));
        }
        Ok(self.root.join(name))
    }

    fn load_or_create_master_key(&self) -> Result<[u8; MASTER_KEY_LEN]> {
        if self.key_path.exists() {
            let encoded = fs::read_to_string(&self.key_path)?;
            let decoded = BASE64
                .decode(encoded.trim().as_bytes())
                .map_err(|_| Error::Internal("Corrupt vault master key".to_string()))?;
            if decoded.len() != MASTER_KEY_LEN {
                return Err(Error::Internal("Corrupt vault master key".to_string()));
            }
            let mut key = [0u8; MASTER_KEY_LEN];
            key.copy_from_slice(&decoded);
            return Ok(key);
        }

        fs::create_dir_all(&self.root)?;
        let mut key = [0u8; MASTER_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        write_new_file_restricted(&self.key_path, BASE64.encode(key).as_bytes())?;
        Ok(key)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let key = self.load_or_create_master_key()?;
        Aes256Gcm::new_from_slice(&key)
            .map_err(|_| Error::Internal("Vault cipher initialization failed".to_string()))
    }
}

#[async_trait]
impl PhotoStore for EncryptedPhotoVault {
    async fn store(&self, blob: &[u8], label: &str) -> Result<PhotoRef> {
        if blob.is_empty() {
            return Err(Error::InvalidInput("Empty photo payload".to_string()));
        }

        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, blob)
            .map_err(|_| Error::Internal("Photo encryption failed".to_string()))?;

        let envelope = PhotoEnvelope {
            nonce_b64: BASE64.encode(nonce_bytes),
            ciphertext_b64: BASE64.encode(&ciphertext),
        };

        let photo_ref = PhotoRef::new(format!("{}_{}.enc", label, Uuid::new_v4().simple()));
        let path = self.photo_path(&photo_ref)?;
        fs::create_dir_all(&self.root)?;
        fs::write(&path, serde_json::to_vec(&envelope)?)?;

        Ok(photo_ref)
    }

    async fn load(&self, photo_ref: &PhotoRef) -> Result<Vec<u8>> {
        let path = self.photo_path(photo_ref)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("Photo not found: {}", photo_ref)));
        }

        let raw = fs::read(&path)?;
        let envelope: PhotoEnvelope = serde_json::from_slice(&raw)?;

        let nonce_raw = BASE64
            .decode(envelope.nonce_b64.as_bytes())
            .map_err(|_| Error::Internal("Corrupt photo envelope".to_string()))?;
        if nonce_raw.len() != NONCE_LEN {
            return Err(Error::Internal("Corrupt photo envelope".to_string()));
        }
        let ciphertext = BASE64
            .decode(envelope.ciphertext_b64.as_bytes())
            .map_err(|_| Error::Internal("Corrupt photo envelope".to_string()))?;

        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(&nonce_raw);
        cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| Error::Internal("Photo decryption failed".to_string()))
    }

    async fn delete(&self, photo_ref: &PhotoRef) -> Result<()> {
        let path = self.photo_path(photo_ref)?;
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn write_new_file_restricted(path: &std::path::Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_new_file_restricted(path: &std::path::Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents)?;
    Ok(())
}

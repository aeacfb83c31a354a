//! In-place directory encryption with ChaCha20-Poly1305.
//!
//! Encrypted files start with [`MAGIC`] followed by the 12-byte nonce and the
//! ciphertext. The key is stored base64-encoded in [`KEY_FILE_NAME`] inside the
//! directory it protects.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use hostctl_core::{Capability, CapabilityArgs, CapabilityError, CapabilityOutput};
use tokio::fs;

use crate::{fs::display, shell::expand_home};

pub const KEY_FILE_NAME: &str = "secretkey.key";
pub const MAGIC: &[u8] = b"HCTLENC1";
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoOp {
    Encrypt,
    Decrypt,
}

/// Encrypts or decrypts every regular file of a directory.
#[derive(Debug, Clone, Copy)]
pub struct CryptoCapability {
    op: CryptoOp,
}

impl CryptoCapability {
    #[must_use]
    pub const fn new(op: CryptoOp) -> Self {
        Self { op }
    }

    #[must_use]
    pub fn all() -> Vec<Arc<dyn Capability>> {
        vec![
            Arc::new(Self::new(CryptoOp::Encrypt)),
            Arc::new(Self::new(CryptoOp::Decrypt)),
        ]
    }
}

#[async_trait]
impl Capability for CryptoCapability {
    fn name(&self) -> &str {
        match self.op {
            CryptoOp::Encrypt => "encrypt_files",
            CryptoOp::Decrypt => "decrypt_files",
        }
    }

    fn description(&self) -> &str {
        match self.op {
            CryptoOp::Encrypt => {
                "Encrypt all files of a directory in place; the key is kept in secretkey.key. Args: directory (optional)."
            }
            CryptoOp::Decrypt => {
                "Decrypt files encrypted by encrypt_files using secretkey.key. Args: directory (optional)."
            }
        }
    }

    async fn invoke(&self, args: &CapabilityArgs) -> Result<CapabilityOutput, CapabilityError> {
        let directory = match args.optional_path("directory") {
            Some(dir) => expand_home(&dir),
            None => std::env::current_dir()
                .map_err(CapabilityError::io("Failed to get current directory"))?,
        };
        match self.op {
            CryptoOp::Encrypt => encrypt_directory(&directory).await,
            CryptoOp::Decrypt => decrypt_directory(&directory).await,
        }
    }
}

async fn target_files(directory: &Path) -> Result<Vec<PathBuf>, CapabilityError> {
    let context = format!("Failed to read directory {}", directory.display());
    let mut entries = fs::read_dir(directory)
        .await
        .map_err(CapabilityError::io(context.clone()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(CapabilityError::io(context.clone()))?
    {
        if entry.file_name() == KEY_FILE_NAME {
            continue;
        }
        if fs::metadata(entry.path()).await.is_ok_and(|m| m.is_file()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

async fn load_key(key_path: &Path) -> Result<ChaCha20Poly1305, CapabilityError> {
    let encoded = fs::read_to_string(key_path).await.map_err(CapabilityError::io(format!(
        "Failed to read key file {}",
        key_path.display()
    )))?;
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| CapabilityError::Other(format!("Key file is not valid base64: {e}")))?;
    ChaCha20Poly1305::new_from_slice(&bytes)
        .map_err(|_| CapabilityError::Other(format!("Key file must hold 32 bytes, got {}", bytes.len())))
}

async fn load_or_create_key(key_path: &Path) -> Result<ChaCha20Poly1305, CapabilityError> {
    if fs::try_exists(key_path).await.unwrap_or(false) {
        return load_key(key_path).await;
    }
    let key = ChaCha20Poly1305::generate_key(&mut OsRng);
    fs::write(key_path, BASE64.encode(key)).await.map_err(CapabilityError::io(format!(
        "Failed to write key file {}",
        key_path.display()
    )))?;
    tracing::info!(key = %key_path.display(), "Generated encryption key");
    Ok(ChaCha20Poly1305::new(&key))
}

fn seal(cipher: &ChaCha20Poly1305, plaintext: &[u8]) -> Result<Vec<u8>, CapabilityError> {
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CapabilityError::Other("encryption failed".into()))?;
    let mut sealed = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(MAGIC);
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open(cipher: &ChaCha20Poly1305, sealed: &[u8]) -> Option<Vec<u8>> {
    let body = sealed.strip_prefix(MAGIC)?;
    if body.len() < NONCE_LEN {
        return None;
    }
    let (nonce, ciphertext) = body.split_at(NONCE_LEN);
    cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
}

async fn encrypt_directory(directory: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let files = target_files(directory).await?;
    let cipher = load_or_create_key(&directory.join(KEY_FILE_NAME)).await?;

    let mut encrypted = 0usize;
    let mut skipped = 0usize;
    for path in &files {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                skipped += 1;
                continue;
            }
        };
        if data.starts_with(MAGIC) {
            skipped += 1;
            continue;
        }
        let sealed = seal(&cipher, &data)?;
        if let Err(e) = fs::write(path, sealed).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write encrypted file");
            skipped += 1;
            continue;
        }
        encrypted += 1;
    }

    Ok(CapabilityOutput::new(format!(
        "Successfully encrypted {encrypted} out of {} files in {}",
        files.len(),
        directory.display()
    ))
    .with("directory", display(directory))
    .with("encrypted_files", encrypted)
    .with("skipped_files", skipped)
    .with("total_files", files.len()))
}

async fn decrypt_directory(directory: &Path) -> Result<CapabilityOutput, CapabilityError> {
    let key_path = directory.join(KEY_FILE_NAME);
    if !fs::try_exists(&key_path).await.unwrap_or(false) {
        return Err(CapabilityError::NotFound(key_path));
    }
    let cipher = load_key(&key_path).await?;
    let files = target_files(directory).await?;

    let mut decrypted = 0usize;
    let mut failed = 0usize;
    for path in &files {
        let Ok(data) = fs::read(path).await else {
            failed += 1;
            continue;
        };
        let Some(plaintext) = open(&cipher, &data) else {
            tracing::debug!(path = %path.display(), "Skipping file that does not decrypt");
            failed += 1;
            continue;
        };
        if fs::write(path, plaintext).await.is_err() {
            failed += 1;
            continue;
        }
        decrypted += 1;
    }

    Ok(CapabilityOutput::new(format!(
        "Successfully decrypted {decrypted} files, {failed} failed in {}",
        directory.display()
    ))
    .with("directory", display(directory))
    .with("decrypted_files", decrypted)
    .with("failed_files", failed)
    .with("total_files", files.len()))
}

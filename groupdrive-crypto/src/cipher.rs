//! AES-256-GCM file encryption with single-use file keys.

use crate::codec::{from_base64, to_base64};
use crate::error::{CryptoError, CryptoResult};
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;
/// AES-GCM IV size in bytes (96 bits).
pub const IV_SIZE: usize = 12;
/// AES-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Ephemeral per-file AES-256-GCM key.
///
/// A key seals at most one plaintext: every file gets its own key, so
/// refusing a second `encrypt_file` rules out IV reuse under one key. The
/// key bytes are wiped on drop and never persisted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
    #[zeroize(skip)]
    sealed: AtomicBool,
}

impl FileKey {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&key);
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            bytes,
            sealed: AtomicBool::new(false),
        }
    }

    pub(crate) fn from_slice(raw: &[u8]) -> CryptoResult<Self> {
        if raw.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: raw.len(),
            });
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(raw);
        Ok(Self::from_bytes(bytes))
    }

    /// Raw key bytes, exported only for wrapping.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Returns whether this key has already sealed a file.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes))
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileKey")
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

/// AES-GCM output: the IV plus ciphertext with the tag appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFile {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
}

impl EncryptedFile {
    /// Decodes the wire (Base64) form of an IV and ciphertext.
    pub fn from_base64(iv: &str, ciphertext: &str) -> CryptoResult<Self> {
        let iv_bytes = from_base64(iv)?;
        if iv_bytes.len() != IV_SIZE {
            return Err(CryptoError::Codec(format!(
                "invalid IV length: expected {IV_SIZE}, got {}",
                iv_bytes.len()
            )));
        }
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&iv_bytes);

        Ok(Self {
            iv,
            ciphertext: from_base64(ciphertext)?,
        })
    }

    pub fn iv_base64(&self) -> String {
        to_base64(&self.iv)
    }

    pub fn ciphertext_base64(&self) -> String {
        to_base64(&self.ciphertext)
    }
}

/// Generates a fresh file key.
pub fn generate_file_key() -> FileKey {
    FileKey::generate()
}

/// Encrypts file bytes under a fresh random 96-bit IV.
pub fn encrypt_file(plaintext: &[u8], key: &FileKey) -> CryptoResult<EncryptedFile> {
    if key.sealed.swap(true, Ordering::SeqCst) {
        return Err(CryptoError::KeyReuse);
    }

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".to_string()))?;

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&nonce);
    Ok(EncryptedFile { iv, ciphertext })
}

/// Decrypts and authenticates file bytes.
pub fn decrypt_file(encrypted: &EncryptedFile, key: &FileKey) -> CryptoResult<Vec<u8>> {
    key.cipher()
        .decrypt(Nonce::from_slice(&encrypted.iv), encrypted.ciphertext.as_ref())
        .map_err(|_| CryptoError::AuthenticationFailure)
}

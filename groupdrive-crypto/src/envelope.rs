//! Envelope encryption for group file sharing.
//!
//! A file is encrypted once under a random AES-256-GCM [`FileKey`]; the
//! file key is then wrapped with RSA-OAEP/SHA-256 for every recipient.
//! Adding a recipient costs one RSA operation, not another pass over the
//! file.
//!
//! Wrapped keys carry no recipient identity. Their order is the order in
//! which recipients were supplied at sealing time.

use crate::cipher::{self, EncryptedFile, FileKey, KEY_SIZE};
use crate::codec::{from_base64, to_base64};
use crate::error::{CryptoError, CryptoResult};
use aes_gcm::aead::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Wraps a file key for one recipient, returning Base64 ciphertext.
pub fn wrap_key_for_recipient(key: &FileKey, recipient: &RsaPublicKey) -> CryptoResult<String> {
    let wrapped = recipient
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
        .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP wrap failed: {e}")))?;
    Ok(to_base64(&wrapped))
}

/// Unwraps a Base64 wrapped file key with the caller's private key.
pub fn unwrap_key(wrapped: &str, own_private: &RsaPrivateKey) -> CryptoResult<FileKey> {
    let ciphertext = from_base64(wrapped)
        .map_err(|e| CryptoError::Unwrap(format!("malformed wrapped key: {e}")))?;

    let raw = Zeroizing::new(
        own_private
            .decrypt(Oaep::new::<Sha256>(), &ciphertext)
            .map_err(|_| {
                CryptoError::Unwrap(
                    "RSA-OAEP decryption failed (wrong key or tampered data)".to_string(),
                )
            })?,
    );

    if raw.len() != KEY_SIZE {
        return Err(CryptoError::Unwrap(format!(
            "unwrapped key has wrong length: expected {KEY_SIZE}, got {}",
            raw.len()
        )));
    }
    FileKey::from_slice(&raw)
}

/// Wire form of an encrypted file and its per-recipient wrapped keys.
///
/// `encrypted_aes_keys[i]` belongs to the i-th recipient passed to
/// [`EncryptedEnvelope::seal`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    pub iv: String,
    pub encrypted_data: String,
    pub encrypted_aes_keys: Vec<String>,
}

impl EncryptedEnvelope {
    /// Encrypts `plaintext` under a fresh file key wrapped for each recipient.
    pub fn seal<'a>(
        plaintext: &[u8],
        recipients: impl IntoIterator<Item = &'a RsaPublicKey>,
    ) -> CryptoResult<Self> {
        let recipients: Vec<&RsaPublicKey> = recipients.into_iter().collect();
        if recipients.is_empty() {
            return Err(CryptoError::NoRecipients);
        }

        let file_key = cipher::generate_file_key();
        let encrypted = cipher::encrypt_file(plaintext, &file_key)?;
        let wrapped = recipients
            .into_iter()
            .map(|pk| wrap_key_for_recipient(&file_key, pk))
            .collect::<CryptoResult<Vec<_>>>()?;

        Ok(Self::from_parts(&encrypted, wrapped))
    }

    pub fn from_parts(encrypted: &EncryptedFile, encrypted_aes_keys: Vec<String>) -> Self {
        Self {
            iv: encrypted.iv_base64(),
            encrypted_data: encrypted.ciphertext_base64(),
            encrypted_aes_keys,
        }
    }

    /// Decodes the IV and ciphertext.
    pub fn encrypted_file(&self) -> CryptoResult<EncryptedFile> {
        EncryptedFile::from_base64(&self.iv, &self.encrypted_data)
    }

    /// Unwraps the file key at `index`.
    pub fn unwrap_at(&self, index: usize, own_private: &RsaPrivateKey) -> CryptoResult<FileKey> {
        let wrapped = self.encrypted_aes_keys.get(index).ok_or_else(|| {
            CryptoError::Unwrap(format!(
                "no wrapped key at position {index} ({} present)",
                self.encrypted_aes_keys.len()
            ))
        })?;
        unwrap_key(wrapped, own_private)
    }

    /// Unwraps the first file key `own_private` can open.
    pub fn unwrap_any(&self, own_private: &RsaPrivateKey) -> CryptoResult<FileKey> {
        self.encrypted_aes_keys
            .iter()
            .find_map(|wrapped| unwrap_key(wrapped, own_private).ok())
            .ok_or_else(|| {
                CryptoError::Unwrap("no wrapped key opens with this private key".to_string())
            })
    }

    /// Decrypts with the wrapped key at `index`.
    pub fn open_at(&self, index: usize, own_private: &RsaPrivateKey) -> CryptoResult<Vec<u8>> {
        let file_key = self.unwrap_at(index, own_private)?;
        cipher::decrypt_file(&self.encrypted_file()?, &file_key)
    }

    /// Decrypts with whichever wrapped key `own_private` can open.
    pub fn open(&self, own_private: &RsaPrivateKey) -> CryptoResult<Vec<u8>> {
        let file_key = self.unwrap_any(own_private)?;
        cipher::decrypt_file(&self.encrypted_file()?, &file_key)
    }
}

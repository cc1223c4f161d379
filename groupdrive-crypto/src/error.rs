//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in key handling and envelope encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("authentication failed (wrong key, wrong IV, or tampered data)")]
    AuthenticationFailure,

    #[error("key unwrap failed: {0}")]
    Unwrap(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("file key already sealed a file; generate a fresh key per file")]
    KeyReuse,

    #[error("envelope has no recipients")]
    NoRecipients,
}

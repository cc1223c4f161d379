//! Error types for directory, transfer and membership operations.

use groupdrive_crypto::CryptoError;
use groupdrive_storage::StorageError;
use groupdrive_types::IdentityError;
use thiserror::Error;

/// Result type for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur talking to the group server or moving files.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("group directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("no recipients: the group has no members with public keys")]
    NoRecipients,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("key store error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidIdentity,
    DuplicateIdentity,
    KeyPairNotFound,
    CodecError,
    AuthenticationFailure,
    UnwrapFailure,
    NoRecipients,
    DirectoryUnavailable,
    NotFound,
    TransportFailure,
    Storage,
    Crypto,
    Config,
}

impl CloudError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(_) | Self::Http(_) => ErrorKind::TransportFailure,
            Self::DirectoryUnavailable(_) => ErrorKind::DirectoryUnavailable,
            Self::NoRecipients => ErrorKind::NoRecipients,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidIdentity(_) => ErrorKind::InvalidIdentity,
            Self::Serialization(_) => ErrorKind::CodecError,
            Self::Crypto(e) => crypto_kind(e),
            Self::Storage(e) => storage_kind(e),
            Self::Io(_) => ErrorKind::Storage,
            Self::Config(_) => ErrorKind::Config,
            Self::Background(_) => ErrorKind::Storage,
        }
    }
}

/// Runs key-store and RSA work on the blocking pool, off the async workers.
pub(crate) async fn run_blocking<T, F>(work: F) -> CloudResult<T>
where
    F: FnOnce() -> CloudResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

fn crypto_kind(err: &CryptoError) -> ErrorKind {
    match err {
        CryptoError::AuthenticationFailure => ErrorKind::AuthenticationFailure,
        CryptoError::Unwrap(_) => ErrorKind::UnwrapFailure,
        CryptoError::Codec(_) | CryptoError::InvalidKeyLength { .. } => ErrorKind::CodecError,
        CryptoError::NoRecipients => ErrorKind::NoRecipients,
        CryptoError::KeyGeneration(_) | CryptoError::Encryption(_) | CryptoError::KeyReuse => {
            ErrorKind::Crypto
        }
    }
}

fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::InvalidIdentity(_) => ErrorKind::InvalidIdentity,
        StorageError::DuplicateIdentity(_) => ErrorKind::DuplicateIdentity,
        StorageError::KeyPairNotFound(_) | StorageError::IncompleteKeyPair { .. } => {
            ErrorKind::KeyPairNotFound
        }
        StorageError::Corrupt { .. } => ErrorKind::CodecError,
        StorageError::Crypto(e) => crypto_kind(e),
        StorageError::DuckDb(_) => ErrorKind::Storage,
    }
}

//! Error types for the key store.

use groupdrive_crypto::CryptoError;
use groupdrive_types::IdentityError;
use thiserror::Error;

/// Which half of a key pair a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHalf {
    Public,
    Private,
}

impl std::fmt::Display for KeyHalf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    #[error("key pair already exists for {0}")]
    DuplicateIdentity(String),

    #[error("no key pair stored for {0}")]
    KeyPairNotFound(String),

    #[error("incomplete key pair for {identity}: {missing} key missing")]
    IncompleteKeyPair { identity: String, missing: KeyHalf },

    #[error("corrupt key material for {identity}: {source}")]
    Corrupt {
        identity: String,
        #[source]
        source: CryptoError,
    },

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

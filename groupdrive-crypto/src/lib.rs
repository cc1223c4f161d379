//! Encryption layer for GroupDrive.
//!
//! Provides the client-side half of end-to-end encrypted group sharing:
//! - RSA-OAEP (SHA-256, 2048-bit) member keypairs
//! - AES-256-GCM per-file encryption with single-use file keys
//! - Per-recipient wrapping of file keys (envelope encryption)
//! - SPKI / PKCS8 / Base64 marshalling for storage and the wire
//!
//! # Architecture
//!
//! Each upload generates a fresh [`FileKey`] and encrypts the file exactly
//! once. The file key is then wrapped with every group member's public key.
//! A member recovers the file by unwrapping their copy of the file key with
//! their private key, which never leaves the device.

pub mod cipher;
pub mod codec;
pub mod envelope;
mod error;
mod keypair;

pub use cipher::{
    EncryptedFile, FileKey, IV_SIZE, KEY_SIZE, TAG_SIZE, decrypt_file, encrypt_file,
    generate_file_key,
};
pub use codec::{
    export_private, export_public, from_base64, import_private, import_public,
    public_key_fingerprint, to_base64,
};
pub use envelope::{EncryptedEnvelope, unwrap_key, wrap_key_for_recipient};
pub use error::{CryptoError, CryptoResult};
pub use keypair::{KeyPair, RSA_MODULUS_BITS, generate_key_pair};
pub use rsa::{RsaPrivateKey as PrivateKey, RsaPublicKey as PublicKey};

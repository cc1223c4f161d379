//! Per-member RSA-OAEP keypairs.

use crate::codec;
use crate::error::{CryptoError, CryptoResult};
use aes_gcm::aead::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use zeroize::Zeroizing;

/// Modulus size for newly generated member keys.
pub const RSA_MODULUS_BITS: usize = 2048;

/// RSA-OAEP/SHA-256 keypair for wrapping file keys.
///
/// The private half zeroizes itself on drop (from `rsa`).
#[derive(Clone)]
pub struct KeyPair {
    pub public: RsaPublicKey,
    pub private: RsaPrivateKey,
}

impl KeyPair {
    /// Generates a fresh 2048-bit keypair with public exponent 65537.
    pub fn generate() -> CryptoResult<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public = private.to_public_key();
        Ok(Self { public, private })
    }

    /// Rebuilds a keypair from its exported halves.
    ///
    /// Rejects halves that do not belong to the same key.
    pub fn from_der(public_der: &[u8], private_der: &[u8]) -> CryptoResult<Self> {
        let public = codec::import_public(public_der)?;
        let private = codec::import_private(private_der)?;
        if private.to_public_key() != public {
            return Err(CryptoError::Codec(
                "public key does not match private key".to_string(),
            ));
        }
        Ok(Self { public, private })
    }

    /// SPKI DER of the public half.
    pub fn public_der(&self) -> CryptoResult<Vec<u8>> {
        codec::export_public(&self.public)
    }

    /// PKCS8 DER of the private half.
    pub fn private_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        codec::export_private(&self.private)
    }

    pub fn fingerprint(&self) -> CryptoResult<String> {
        codec::public_key_fingerprint(&self.public)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("modulus_bits", &(self.public.size() * 8))
            .finish_non_exhaustive()
    }
}

/// Generates a new member keypair.
pub fn generate_key_pair() -> CryptoResult<KeyPair> {
    KeyPair::generate()
}

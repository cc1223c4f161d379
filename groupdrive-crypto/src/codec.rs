//! Key marshalling and Base64 transcoding.
//!
//! Public keys travel as SPKI DER, private keys as PKCS8 DER. Both are raw
//! bytes at rest and standard padded Base64 on the wire.

use crate::error::{CryptoError, CryptoResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Smallest RSA modulus accepted on import.
pub const MIN_MODULUS_BITS: usize = 2048;

/// Exports a public key as SPKI DER.
pub fn export_public(key: &RsaPublicKey) -> CryptoResult<Vec<u8>> {
    key.to_public_key_der()
        .map(|doc| doc.into_vec())
        .map_err(|e| CryptoError::Codec(format!("SPKI export failed: {e}")))
}

/// Exports a private key as PKCS8 DER. The buffer is wiped on drop.
pub fn export_private(key: &RsaPrivateKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    key.to_pkcs8_der()
        .map(|doc| doc.to_bytes())
        .map_err(|e| CryptoError::Codec(format!("PKCS8 export failed: {e}")))
}

/// Imports an RSA-OAEP public key from SPKI DER.
pub fn import_public(der: &[u8]) -> CryptoResult<RsaPublicKey> {
    let key = RsaPublicKey::from_public_key_der(der)
        .map_err(|e| CryptoError::Codec(format!("invalid SPKI public key: {e}")))?;
    check_modulus(key.size())?;
    Ok(key)
}

/// Imports an RSA-OAEP private key from PKCS8 DER.
pub fn import_private(der: &[u8]) -> CryptoResult<RsaPrivateKey> {
    let key = RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| CryptoError::Codec(format!("invalid PKCS8 private key: {e}")))?;
    check_modulus(key.size())?;
    Ok(key)
}

fn check_modulus(size_bytes: usize) -> CryptoResult<()> {
    if size_bytes * 8 < MIN_MODULUS_BITS {
        return Err(CryptoError::Codec(format!(
            "RSA modulus too small: {} bits, need at least {MIN_MODULUS_BITS}",
            size_bytes * 8
        )));
    }
    Ok(())
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard Base64 after stripping embedded whitespace.
///
/// Payloads coming back from storage or mail-style transports are often
/// wrapped at fixed line widths.
pub fn from_base64(encoded: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(sanitize_base64(encoded))
        .map_err(|e| CryptoError::Codec(format!("invalid base64: {e}")))
}

fn sanitize_base64(encoded: &str) -> String {
    encoded.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Hex SHA-256 of the SPKI encoding, for logs and out-of-band comparison.
pub fn public_key_fingerprint(key: &RsaPublicKey) -> CryptoResult<String> {
    let der = export_public(key)?;
    Ok(hex::encode(Sha256::digest(&der)))
}

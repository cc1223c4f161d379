//! Shared types for directory, transfer and catalogue operations.

use chrono::{DateTime, Utc};
use groupdrive_crypto::{EncryptedEnvelope, PublicKey};
use groupdrive_types::Identity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member as listed by the group directory. `public_key` is Base64 SPKI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub email: String,
    pub public_key: String,
}

/// A directory entry whose identity and public key have been validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub identity: Identity,
    pub public_key: PublicKey,
}

/// Everything the transport needs to store one encrypted file.
///
/// `recipients[i]` owns `envelope.encrypted_aes_keys[i]`.
#[derive(Clone, Debug)]
pub struct UploadPayload {
    pub uploader: Identity,
    pub file_name: String,
    pub envelope: EncryptedEnvelope,
    pub recipients: Vec<Identity>,
}

/// Parameters of a download request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    pub file_id: String,
    pub file_name: String,
    pub requester: Identity,
}

/// An encrypted file as returned by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadedFile {
    pub envelope: EncryptedEnvelope,
    pub uploader: Option<String>,
    /// Identities in wrapped-key order, when the uploader recorded them.
    pub recipients: Option<Vec<String>>,
}

/// A file listed in the shared catalogue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    #[serde(rename = "createdTime", default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub uploader: String,
}

/// Outcome of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReceipt {
    pub transfer_id: Uuid,
    pub file_name: String,
    pub recipients: Vec<Identity>,
}

/// Outcome of a successful download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadReceipt {
    pub transfer_id: Uuid,
    pub file_name: String,
    pub uploader: Option<String>,
    pub size: usize,
}

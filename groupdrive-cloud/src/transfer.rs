//! Encrypted upload and download pipelines.
//!
//! Every transfer owns its file key and envelope; the orchestrator holds no
//! mutable crypto state, so transfers may run concurrently. A failed
//! transfer reports the last state it reached and never sends a partial
//! envelope.

use crate::config::CloudConfig;
use crate::directory::{GroupDirectory, resolve_recipients};
use crate::error::{CloudError, CloudResult, ErrorKind, run_blocking};
use crate::types::*;
use groupdrive_crypto::{
    CryptoError, EncryptedEnvelope, FileKey, KeyPair, decrypt_file, encrypt_file,
    generate_file_key, wrap_key_for_recipient,
};
use groupdrive_storage::KeyStore;
use groupdrive_types::Identity;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Moves encrypted files to and from the server.
pub trait FileTransport: Send + Sync {
    fn upload(&self, payload: &UploadPayload) -> impl Future<Output = CloudResult<()>> + Send;

    /// Returns `None` when the server holds no data for the request.
    fn download(
        &self,
        request: &DownloadRequest,
    ) -> impl Future<Output = CloudResult<Option<DownloadedFile>>> + Send;
}

impl<T: FileTransport> FileTransport for Arc<T> {
    fn upload(&self, payload: &UploadPayload) -> impl Future<Output = CloudResult<()>> + Send {
        (**self).upload(payload)
    }

    fn download(
        &self,
        request: &DownloadRequest,
    ) -> impl Future<Output = CloudResult<Option<DownloadedFile>>> + Send {
        (**self).download(request)
    }
}

/// Receives decrypted downloads.
pub trait FileSink: Send + Sync {
    fn save(&self, file_name: &str, contents: &[u8]) -> impl Future<Output = CloudResult<()>> + Send;
}

/// Writes downloads into a local directory.
///
/// Only the final path component of the file name is used, so a hostile
/// name cannot escape the directory.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where `file_name` would be written.
    pub fn target_path(&self, file_name: &str) -> CloudResult<PathBuf> {
        let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
        if base.is_empty() || base == "." || base == ".." {
            return Err(CloudError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unusable file name: {file_name:?}"),
            )));
        }
        Ok(self.dir.join(base))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSink for DirectorySink {
    async fn save(&self, file_name: &str, contents: &[u8]) -> CloudResult<()> {
        let path = self.target_path(file_name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, contents).await?;
        debug!(path = %path.display(), bytes = contents.len(), "saved download");
        Ok(())
    }
}

// ── States ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    KeyGenerated,
    FileEncrypted,
    RecipientsResolved,
    KeysWrapped,
    Uploaded,
    Failed(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    Fetched,
    KeyUnwrapped,
    Decrypted,
    Saved,
    Failed(ErrorKind),
}

/// A failed transfer: the last state reached before `error` occurred.
#[derive(Debug, Error)]
#[error("transfer failed after {reached:?}: {error}")]
pub struct TransferFailure<S: fmt::Debug> {
    pub reached: S,
    #[source]
    pub error: CloudError,
}

impl<S: fmt::Debug> TransferFailure<S> {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn into_error(self) -> CloudError {
        self.error
    }
}

impl TransferFailure<UploadState> {
    /// The terminal state of the failed upload.
    pub fn state(&self) -> UploadState {
        UploadState::Failed(self.kind())
    }
}

impl TransferFailure<DownloadState> {
    /// The terminal state of the failed download.
    pub fn state(&self) -> DownloadState {
        DownloadState::Failed(self.kind())
    }
}

fn fail<S: fmt::Debug>(transfer_id: Uuid, reached: S, error: impl Into<CloudError>) -> TransferFailure<S> {
    let error = error.into();
    warn!(%transfer_id, reached = ?reached, kind = ?error.kind(), %error, "transfer failed");
    TransferFailure { reached, error }
}

// ── Orchestrator ──

/// Runs encrypted uploads and downloads for group members.
pub struct TransferOrchestrator<D, T> {
    key_store: KeyStore,
    directory: D,
    transport: T,
    config: CloudConfig,
}

impl<D: GroupDirectory, T: FileTransport> TransferOrchestrator<D, T> {
    pub fn new(key_store: KeyStore, directory: D, transport: T, config: CloudConfig) -> Self {
        Self {
            key_store,
            directory,
            transport,
            config,
        }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    /// Encrypts `plaintext` for every current group member and uploads it.
    pub async fn upload(
        &self,
        uploader: &str,
        file_name: &str,
        plaintext: &[u8],
    ) -> Result<UploadReceipt, TransferFailure<UploadState>> {
        let transfer_id = Uuid::new_v4();
        let uploader = Identity::parse(uploader).map_err(|e| fail(transfer_id, UploadState::Idle, e))?;
        debug!(%transfer_id, %uploader, file = file_name, "upload started");

        let file_key = generate_file_key();
        let state = UploadState::KeyGenerated;

        let encrypted = encrypt_file(plaintext, &file_key).map_err(|e| fail(transfer_id, state, e))?;
        let state = UploadState::FileEncrypted;

        let recipients = resolve_recipients(&self.directory)
            .await
            .map_err(|e| fail(transfer_id, state, e))?;
        let state = UploadState::RecipientsResolved;

        let wrapped = wrap_for_all(&file_key, &recipients).map_err(|e| fail(transfer_id, state, e))?;
        drop(file_key);
        let state = UploadState::KeysWrapped;
        debug!(%transfer_id, recipients = wrapped.len(), "file key wrapped");

        let recipients: Vec<Identity> = recipients.into_iter().map(|r| r.identity).collect();
        let payload = UploadPayload {
            uploader,
            file_name: file_name.to_string(),
            envelope: EncryptedEnvelope::from_parts(&encrypted, wrapped),
            recipients,
        };
        self.transport
            .upload(&payload)
            .await
            .map_err(|e| fail(transfer_id, state, e))?;

        info!(%transfer_id, file = file_name, recipients = payload.recipients.len(), "upload complete");
        Ok(UploadReceipt {
            transfer_id,
            file_name: payload.file_name,
            recipients: payload.recipients,
        })
    }

    /// Fetches, decrypts and saves a file for `requester`.
    pub async fn download(
        &self,
        requester: &str,
        file_id: &str,
        file_name: &str,
        sink: &impl FileSink,
    ) -> Result<DownloadReceipt, TransferFailure<DownloadState>> {
        let transfer_id = Uuid::new_v4();
        let state = DownloadState::Idle;
        let requester = Identity::parse(requester).map_err(|e| fail(transfer_id, state, e))?;
        debug!(%transfer_id, %requester, file_id, "download started");

        let request = DownloadRequest {
            file_id: file_id.to_string(),
            file_name: file_name.to_string(),
            requester: requester.clone(),
        };
        let fetched = self
            .transport
            .download(&request)
            .await
            .and_then(|found| found.ok_or_else(|| CloudError::NotFound(file_id.to_string())))
            .map_err(|e| fail(transfer_id, state, e))?;
        let state = DownloadState::Fetched;

        let pair = self
            .load_key_pair(&requester)
            .await
            .map_err(|e| fail(transfer_id, state, e))?;
        let file_key = select_file_key(&fetched, &requester, &pair).map_err(|e| fail(transfer_id, state, e))?;
        let state = DownloadState::KeyUnwrapped;

        let plaintext = fetched
            .envelope
            .encrypted_file()
            .and_then(|encrypted| decrypt_file(&encrypted, &file_key))
            .map_err(|e| fail(transfer_id, state, e))?;
        drop(file_key);
        let state = DownloadState::Decrypted;

        sink.save(file_name, &plaintext)
            .await
            .map_err(|e| fail(transfer_id, state, e))?;

        info!(%transfer_id, file = file_name, bytes = plaintext.len(), "download complete");
        Ok(DownloadReceipt {
            transfer_id,
            file_name: file_name.to_string(),
            uploader: fetched.uploader,
            size: plaintext.len(),
        })
    }

    async fn load_key_pair(&self, requester: &Identity) -> CloudResult<KeyPair> {
        let key_store = self.key_store.clone();
        let identity = requester.clone();
        let lazy = self.config.lazy_key_provisioning;
        run_blocking(move || {
            let pair = if lazy {
                key_store.get_or_create(identity.as_str())?
            } else {
                key_store.retrieve(identity.as_str())?
            };
            Ok(pair)
        })
        .await
    }
}

fn wrap_for_all(file_key: &FileKey, recipients: &[Recipient]) -> CloudResult<Vec<String>> {
    recipients
        .iter()
        .map(|r| wrap_key_for_recipient(file_key, &r.public_key).map_err(CloudError::from))
        .collect()
}

/// Picks the requester's wrapped key by identity when the upload recorded
/// recipients, otherwise by trying each entry in order.
fn select_file_key(fetched: &DownloadedFile, requester: &Identity, pair: &KeyPair) -> CloudResult<FileKey> {
    let envelope = &fetched.envelope;
    let Some(recipients) = &fetched.recipients else {
        return envelope
            .unwrap_any(&pair.private)
            .map_err(|_| CryptoError::Unwrap(format!("no wrapped key opens for {requester}")).into());
    };

    let index = recipients
        .iter()
        .position(|r| Identity::parse(r).is_ok_and(|id| id == *requester))
        .ok_or_else(|| CryptoError::Unwrap(format!("{requester} is not among the file's recipients")))?;
    Ok(envelope.unwrap_at(index, &pair.private)?)
}

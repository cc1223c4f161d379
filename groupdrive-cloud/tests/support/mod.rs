//! In-memory collaborators for transfer tests.

#![allow(dead_code)]

use groupdrive_cloud::{
    CloudConfig, CloudError, CloudResult, DirectoryEntry, DownloadRequest, DownloadedFile,
    FileSink, FileTransport, GroupDirectory, TransferOrchestrator, UploadPayload,
};
use groupdrive_crypto::{KeyPair, to_base64};
use groupdrive_storage::KeyStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

pub const ALICE: &str = "alice@example.com";
pub const BOB: &str = "bob@example.com";
pub const CAROL: &str = "carol@example.com";

pub fn alice_pair() -> &'static KeyPair {
    static KP: OnceLock<KeyPair> = OnceLock::new();
    KP.get_or_init(|| KeyPair::generate().unwrap())
}

pub fn bob_pair() -> &'static KeyPair {
    static KP: OnceLock<KeyPair> = OnceLock::new();
    KP.get_or_init(|| KeyPair::generate().unwrap())
}

pub fn carol_pair() -> &'static KeyPair {
    static KP: OnceLock<KeyPair> = OnceLock::new();
    KP.get_or_init(|| KeyPair::generate().unwrap())
}

pub fn entry(email: &str, pair: &KeyPair) -> DirectoryEntry {
    DirectoryEntry {
        email: email.to_string(),
        public_key: to_base64(&pair.public_der().unwrap()),
    }
}

/// An in-memory key store holding the given members' pairs.
pub fn store_with(members: &[(&str, &KeyPair)]) -> KeyStore {
    let store = KeyStore::open_in_memory().unwrap();
    for (email, pair) in members {
        store.store(email, pair).unwrap();
    }
    store
}

/// The alice + bob group.
pub fn two_member_directory() -> Arc<FakeDirectory> {
    Arc::new(FakeDirectory::with_members(vec![
        entry(ALICE, alice_pair()),
        entry(BOB, bob_pair()),
    ]))
}

pub fn orchestrator(
    store: KeyStore,
    directory: Arc<FakeDirectory>,
    transport: Arc<FakeTransport>,
) -> TransferOrchestrator<Arc<FakeDirectory>, Arc<FakeTransport>> {
    TransferOrchestrator::new(store, directory, transport, CloudConfig::default())
}

// ── Directory ──

pub struct FakeDirectory {
    members: Result<Vec<DirectoryEntry>, String>,
    calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn with_members(members: Vec<DirectoryEntry>) -> Self {
        Self {
            members: Ok(members),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(message: &str) -> Self {
        Self {
            members: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GroupDirectory for FakeDirectory {
    async fn list_members(&self) -> CloudResult<Vec<DirectoryEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.members.clone().map_err(CloudError::Api)
    }
}

// ── Transport ──

/// Keeps uploads in memory and serves them back by file name.
#[derive(Default)]
pub struct FakeTransport {
    pub uploads: Mutex<Vec<UploadPayload>>,
    pub upload_calls: AtomicUsize,
    /// Drop the recipients list on download, like a server that ignores it.
    pub omit_recipients: bool,
    /// Fail every upload with this message.
    pub fail_uploads: Option<String>,
}

impl FakeTransport {
    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<UploadPayload> {
        self.uploads.lock().unwrap().clone()
    }

    /// Edits the stored copy of `file_name`.
    pub fn tamper(&self, file_name: &str, edit: impl FnOnce(&mut UploadPayload)) {
        let mut uploads = self.uploads.lock().unwrap();
        let payload = uploads
            .iter_mut()
            .find(|p| p.file_name == file_name)
            .expect("no such upload");
        edit(payload);
    }
}

impl FileTransport for FakeTransport {
    async fn upload(&self, payload: &UploadPayload) -> CloudResult<()> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_uploads {
            return Err(CloudError::Api(message.clone()));
        }
        self.uploads.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn download(&self, request: &DownloadRequest) -> CloudResult<Option<DownloadedFile>> {
        let uploads = self.uploads.lock().unwrap();
        Ok(uploads
            .iter()
            .find(|p| p.file_name == request.file_id)
            .map(|p| DownloadedFile {
                envelope: p.envelope.clone(),
                uploader: Some(p.uploader.to_string()),
                recipients: (!self.omit_recipients)
                    .then(|| p.recipients.iter().map(|r| r.to_string()).collect()),
            }))
    }
}

// ── Sink ──

#[derive(Default)]
pub struct MemorySink {
    saved: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemorySink {
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().unwrap().clone()
    }
}

impl FileSink for MemorySink {
    async fn save(&self, file_name: &str, contents: &[u8]) -> CloudResult<()> {
        self.saved
            .lock()
            .unwrap()
            .push((file_name.to_string(), contents.to_vec()));
        Ok(())
    }
}

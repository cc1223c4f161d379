//! Group side of GroupDrive.
//!
//! Provides:
//! - The group key directory and recipient resolution
//! - Encrypted upload/download orchestration with explicit transfer states
//! - Member provisioning against the group server
//! - An HTTP client for the server's upload, download, membership and
//!   catalogue endpoints

pub mod api_client;
pub mod config;
pub mod directory;
pub mod error;
pub mod membership;
pub mod transfer;
pub mod types;

pub use api_client::CloudApiClient;
pub use config::CloudConfig;
pub use directory::{GroupDirectory, resolve_recipients};
pub use error::{CloudError, CloudResult, ErrorKind};
pub use membership::{MembershipManager, NewMember};
pub use transfer::{
    DirectorySink, DownloadState, FileSink, FileTransport, TransferFailure, TransferOrchestrator,
    UploadState,
};
pub use types::*;

/// Installs a stderr `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`). Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

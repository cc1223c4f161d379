//! Durable key storage for GroupDrive.
//!
//! Each group member's RSA key pair lives in a local DuckDB database as two
//! records, the SPKI public key and the PKCS8 private key. Both halves are
//! written and removed together inside one transaction.

mod error;
mod key_store;

pub use error::{KeyHalf, StorageError, StorageResult};
pub use key_store::KeyStore;

/// Open a DuckDB connection, retrying once without a stale WAL file.
///
/// An unclean shutdown can leave a `.wal` file next to the database that
/// prevents reopening. If the first open fails and one exists, it is removed
/// and the open is retried.
pub fn open_duckdb_with_wal_recovery(path: &std::path::Path) -> StorageResult<duckdb::Connection> {
    match duckdb::Connection::open(path) {
        Ok(conn) => Ok(conn),
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if wal_path.exists() {
                tracing::warn!(
                    wal = %wal_path.display(),
                    error = %first_err,
                    "DuckDB open failed, removing stale WAL and retrying"
                );
                if std::fs::remove_file(&wal_path).is_ok() {
                    return Ok(duckdb::Connection::open(path)?);
                }
            }
            Err(first_err.into())
        }
    }
}

//! Key pair persistence.
//!
//! Records live in a single `key_records` table keyed by
//! `<identity>_publicKey` and `<identity>_privateKey`. The identity in the
//! key is always the canonical lower-cased form.

use crate::error::{KeyHalf, StorageError, StorageResult};
use duckdb::{Connection, params};
use groupdrive_crypto::KeyPair;
use groupdrive_types::Identity;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const PUBLIC_SUFFIX: &str = "_publicKey";
const PRIVATE_SUFFIX: &str = "_privateKey";

/// Local store of group members' RSA key pairs, backed by DuckDB.
///
/// Cloning shares the underlying connection. Every write runs as a single
/// transaction while holding the connection lock, so concurrent writers for
/// the same identity serialize.
#[derive(Clone)]
pub struct KeyStore {
    conn: Arc<Mutex<Connection>>,
}

impl KeyStore {
    /// Opens or creates a key store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path)?;
        initialize_key_schema(&conn)?;
        debug!(path = %path.display(), "key store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory key store.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_key_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Closes the store, flushing the database.
    ///
    /// If other clones of this handle are still alive the connection stays
    /// open until the last one is dropped.
    pub fn close(self) -> StorageResult<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => {
                let conn = mutex.into_inner().unwrap_or_else(|p| p.into_inner());
                conn.close().map_err(|(_, e)| StorageError::DuckDb(e))?;
                debug!("key store closed");
                Ok(())
            }
            Err(_) => {
                debug!("key store handle released, connection still shared");
                Ok(())
            }
        }
    }

    /// Acquire the connection lock, recovering from poison.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("key store recovering from poisoned mutex");
            poisoned.into_inner()
        })
    }

    /// Returns the stored pair for `identity`, generating and storing one
    /// if none exists.
    pub fn get_or_create(&self, identity: &str) -> StorageResult<KeyPair> {
        let identity = Identity::parse(identity)?;
        match self.retrieve_canonical(&identity) {
            Ok(pair) => return Ok(pair),
            Err(StorageError::KeyPairNotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let pair = KeyPair::generate()?;
        match self.store_canonical(&identity, &pair) {
            Ok(()) => Ok(pair),
            // Lost a creation race; the winner's pair is authoritative.
            Err(StorageError::DuplicateIdentity(_)) => self.retrieve_canonical(&identity),
            Err(e) => Err(e),
        }
    }

    /// Stores a key pair. Never overwrites an existing pair.
    pub fn store(&self, identity: &str, pair: &KeyPair) -> StorageResult<()> {
        let identity = Identity::parse(identity)?;
        self.store_canonical(&identity, pair)
    }

    fn store_canonical(&self, identity: &Identity, pair: &KeyPair) -> StorageResult<()> {
        let public = pair.public_der()?;
        let private = pair.private_der()?;
        self.write_pair(identity, &public, &private, |_| Ok(()))?;
        info!(
            identity = %identity,
            fingerprint = %pair.fingerprint().unwrap_or_default(),
            "key pair stored"
        );
        Ok(())
    }

    /// Inserts both records in one transaction. `before_insert` runs ahead
    /// of each insert and aborts the whole write if it fails.
    fn write_pair(
        &self,
        identity: &Identity,
        public_der: &[u8],
        private_der: &[u8],
        mut before_insert: impl FnMut(KeyHalf) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let conn = self.lock_conn();
        in_transaction(&conn, |conn| {
            let (has_public, has_private) = record_presence(conn, identity)?;
            if has_public || has_private {
                return Err(StorageError::DuplicateIdentity(identity.to_string()));
            }

            for (half, data) in [(KeyHalf::Public, public_der), (KeyHalf::Private, private_der)] {
                before_insert(half)?;
                conn.execute(
                    "INSERT INTO key_records (id, key_data) VALUES (?, ?)",
                    params![record_id(identity, half), data],
                )?;
            }
            Ok(())
        })
    }

    /// Loads the key pair stored for `identity`.
    pub fn retrieve(&self, identity: &str) -> StorageResult<KeyPair> {
        let identity = Identity::parse(identity)?;
        self.retrieve_canonical(&identity)
    }

    fn retrieve_canonical(&self, identity: &Identity) -> StorageResult<KeyPair> {
        let conn = self.lock_conn();
        let public = read_record(&conn, &record_id(identity, KeyHalf::Public))?;
        let private = read_record(&conn, &record_id(identity, KeyHalf::Private))?.map(Zeroizing::new);
        drop(conn);

        match (public, private) {
            (Some(public), Some(private)) => {
                KeyPair::from_der(&public, &private).map_err(|source| StorageError::Corrupt {
                    identity: identity.to_string(),
                    source,
                })
            }
            (None, None) => Err(StorageError::KeyPairNotFound(identity.to_string())),
            (Some(_), None) => Err(incomplete(identity, KeyHalf::Private)),
            (None, Some(_)) => Err(incomplete(identity, KeyHalf::Public)),
        }
    }

    /// True iff both halves are stored. A lone half is an error, not absence.
    pub fn exists(&self, identity: &str) -> StorageResult<bool> {
        let identity = Identity::parse(identity)?;
        let conn = self.lock_conn();
        match record_presence(&conn, &identity)? {
            (true, true) => Ok(true),
            (false, false) => Ok(false),
            (true, false) => Err(incomplete(&identity, KeyHalf::Private)),
            (false, true) => Err(incomplete(&identity, KeyHalf::Public)),
        }
    }

    /// Deletes both halves of the pair. Removing an absent pair succeeds.
    pub fn remove(&self, identity: &str) -> StorageResult<()> {
        let identity = Identity::parse(identity)?;
        let conn = self.lock_conn();
        let deleted = in_transaction(&conn, |conn| {
            let mut deleted = 0;
            for half in [KeyHalf::Public, KeyHalf::Private] {
                deleted += conn.execute(
                    "DELETE FROM key_records WHERE id = ?",
                    params![record_id(&identity, half)],
                )?;
            }
            Ok(deleted)
        })?;

        if deleted > 0 {
            info!(identity = %identity, records = deleted, "key pair removed");
        } else {
            debug!(identity = %identity, "no key pair to remove");
        }
        Ok(())
    }

    /// Identities holding a complete key pair, sorted.
    pub fn identities(&self) -> StorageResult<Vec<Identity>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare("SELECT id FROM key_records")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut public = BTreeSet::new();
        let mut private = BTreeSet::new();
        for id in &ids {
            if let Some(name) = id.strip_suffix(PUBLIC_SUFFIX) {
                public.insert(name);
            } else if let Some(name) = id.strip_suffix(PRIVATE_SUFFIX) {
                private.insert(name);
            }
        }

        Ok(public
            .intersection(&private)
            .filter_map(|name| match Identity::parse(name) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!(record = %name, error = %e, "skipping key record with invalid identity");
                    None
                }
            })
            .collect())
    }
}

fn initialize_key_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS key_records (
            id VARCHAR PRIMARY KEY,
            key_data BLOB NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn record_id(identity: &Identity, half: KeyHalf) -> String {
    match half {
        KeyHalf::Public => format!("{identity}{PUBLIC_SUFFIX}"),
        KeyHalf::Private => format!("{identity}{PRIVATE_SUFFIX}"),
    }
}

fn incomplete(identity: &Identity, missing: KeyHalf) -> StorageError {
    warn!(identity = %identity, missing = %missing, "incomplete key pair in store");
    StorageError::IncompleteKeyPair {
        identity: identity.to_string(),
        missing,
    }
}

fn read_record(conn: &Connection, id: &str) -> StorageResult<Option<Vec<u8>>> {
    match conn.query_row(
        "SELECT key_data FROM key_records WHERE id = ?",
        params![id],
        |row| row.get::<_, Vec<u8>>(0),
    ) {
        Ok(data) => Ok(Some(data)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn record_presence(conn: &Connection, identity: &Identity) -> StorageResult<(bool, bool)> {
    let count = |half: KeyHalf| -> StorageResult<bool> {
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM key_records WHERE id = ?",
            params![record_id(identity, half)],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    };
    Ok((count(KeyHalf::Public)?, count(KeyHalf::Private)?))
}

/// Runs `f` inside a transaction, rolling back on any error.
fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> StorageResult<T>,
) -> StorageResult<T> {
    conn.execute_batch("BEGIN TRANSACTION")?;
    match f(conn) {
        Ok(value) => {
            if let Err(e) = conn.execute_batch("COMMIT") {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e.into());
            }
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

//! Group membership: provisioning member key pairs and registering them.
//!
//! The private key stays in the local key store; only the public half is
//! sent to the server.

use crate::api_client::CloudApiClient;
use crate::error::{CloudResult, run_blocking};
use groupdrive_crypto::{KeyPair, to_base64};
use groupdrive_storage::{KeyStore, StorageError};
use groupdrive_types::Identity;
use std::sync::Arc;
use tracing::{info, warn};

/// A newly registered member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMember {
    pub identity: Identity,
    /// Hex SHA-256 of the member's SPKI public key.
    pub fingerprint: String,
}

/// Adds and removes group members.
pub struct MembershipManager {
    api: Arc<CloudApiClient>,
    key_store: KeyStore,
}

impl MembershipManager {
    pub fn new(api: Arc<CloudApiClient>, key_store: KeyStore) -> Self {
        Self { api, key_store }
    }

    /// Generates and stores a key pair for `email`, then registers its
    /// public key with the server.
    ///
    /// If registration fails the local pair is removed again.
    pub async fn add_member(&self, email: &str) -> CloudResult<NewMember> {
        let identity = Identity::parse(email)?;

        let key_store = self.key_store.clone();
        let id = identity.clone();
        let pair = run_blocking(move || {
            if key_store.exists(id.as_str())? {
                return Err(StorageError::DuplicateIdentity(id.to_string()).into());
            }
            let pair = KeyPair::generate()?;
            key_store.store(id.as_str(), &pair)?;
            Ok(pair)
        })
        .await?;

        let registered = async {
            let public_key = to_base64(&pair.public_der()?);
            self.api.add_user(&identity, &public_key).await
        }
        .await;

        if let Err(e) = registered {
            let key_store = self.key_store.clone();
            let id = identity.clone();
            let cleanup = run_blocking(move || Ok(key_store.remove(id.as_str())?)).await;
            if let Err(cleanup) = cleanup {
                warn!(identity = %identity, error = %cleanup, "failed to roll back local key pair");
            }
            return Err(e);
        }

        let fingerprint = pair.fingerprint()?;
        info!(identity = %identity, %fingerprint, "member added");
        Ok(NewMember {
            identity,
            fingerprint,
        })
    }

    /// Unregisters `email` and deletes its local key pair.
    pub async fn remove_member(&self, email: &str) -> CloudResult<()> {
        let identity = Identity::parse(email)?;
        self.api.remove_user(&identity).await?;

        let key_store = self.key_store.clone();
        let id = identity.clone();
        run_blocking(move || Ok(key_store.remove(id.as_str())?)).await?;
        info!(identity = %identity, "member removed");
        Ok(())
    }

    /// Group members currently registered on the server.
    pub async fn list_members(&self) -> CloudResult<Vec<Identity>> {
        self.api.list_users().await
    }

    pub async fn is_member(&self, email: &str) -> CloudResult<bool> {
        let identity = Identity::parse(email)?;
        self.api.user_exists(&identity).await
    }
}

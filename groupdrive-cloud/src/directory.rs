//! Group key directory: who the group's members are and their public keys.

use crate::error::{CloudError, CloudResult};
use crate::types::{DirectoryEntry, Recipient};
use groupdrive_crypto::{from_base64, import_public};
use groupdrive_types::Identity;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Source of the current group membership.
pub trait GroupDirectory: Send + Sync {
    /// Lists members with their Base64 SPKI public keys, in server order.
    fn list_members(&self) -> impl Future<Output = CloudResult<Vec<DirectoryEntry>>> + Send;
}

impl<D: GroupDirectory> GroupDirectory for Arc<D> {
    fn list_members(&self) -> impl Future<Output = CloudResult<Vec<DirectoryEntry>>> + Send {
        (**self).list_members()
    }
}

/// Resolves the directory into validated recipients, preserving order.
///
/// Any directory failure surfaces as `DirectoryUnavailable`. An empty group
/// is `NoRecipients`, so nothing is ever sealed for nobody.
pub async fn resolve_recipients(directory: &impl GroupDirectory) -> CloudResult<Vec<Recipient>> {
    let entries = directory.list_members().await.map_err(|e| match e {
        CloudError::DirectoryUnavailable(_) => e,
        other => CloudError::DirectoryUnavailable(other.to_string()),
    })?;

    if entries.is_empty() {
        return Err(CloudError::NoRecipients);
    }

    let recipients = entries
        .iter()
        .map(|entry| {
            let identity = Identity::parse(&entry.email)?;
            let public_key = import_public(&from_base64(&entry.public_key)?)?;
            Ok(Recipient {
                identity,
                public_key,
            })
        })
        .collect::<CloudResult<Vec<_>>>()?;

    debug!(count = recipients.len(), "resolved group recipients");
    Ok(recipients)
}

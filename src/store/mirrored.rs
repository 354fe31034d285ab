use async_trait::async_trait;

use super::{BlobStore, DriveStore, LocalStore, StoreError};
use crate::config::MirrorPolicy;
use crate::models::doodle::Doodle;

/// Writes every doodle to disk and to Drive.
///
/// The local copy is authoritative: listing, fetching and gallery URLs come
/// from disk. Drive failures either fail the request (`Strict`) or are only
/// logged (`BestEffort`). Nothing is rolled back either way.
pub struct MirroredStore {
    local: LocalStore,
    drive: DriveStore,
    policy: MirrorPolicy,
}

impl MirroredStore {
    pub fn new(local: LocalStore, drive: DriveStore, policy: MirrorPolicy) -> Self {
        Self { local, drive, policy }
    }

    fn remote_outcome(&self, action: &str, id: &str, result: Result<(), StoreError>) -> Result<(), StoreError> {
        match (result, self.policy) {
            (Ok(()), _) => Ok(()),
            (Err(e), MirrorPolicy::BestEffort) => {
                log::warn!("drive {action} of {id} failed, local copy kept: {e}");
                Ok(())
            }
            (Err(e), MirrorPolicy::Strict) => Err(e),
        }
    }
}

#[async_trait]
impl BlobStore for MirroredStore {
    async fn put(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<Doodle, StoreError> {
        let doodle = self.local.put(bytes.clone(), suggested_name).await?;
        let remote = self.drive.put(bytes, suggested_name).await.map(|_| ());
        self.remote_outcome("upload", suggested_name, remote)?;
        Ok(doodle)
    }

    async fn list(&self) -> Result<Vec<Doodle>, StoreError> {
        self.local.list().await
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        self.local.fetch(id).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.local.delete(id).await?;
        // the local name doubles as the Drive file name
        let remote = match self.drive.delete(id).await {
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        };
        self.remote_outcome("delete", id, remote)
    }
}

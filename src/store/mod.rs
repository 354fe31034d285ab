//! Doodle storage backends.
//!
//! Every backend implements [`BlobStore`]; which one the server uses is
//! decided once at startup from [`Config::backend`].

pub mod drive;
pub mod local;
pub mod mirrored;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Backend, Config};
use crate::credentials::{AuthError, CredentialProvider};
use crate::models::doodle::Doodle;

pub use drive::DriveStore;
pub use local::LocalStore;
pub use mirrored::MirroredStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("doodle not found: {0}")]
    NotFound(String),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("drive request failed ({status}): {message}")]
    Remote { status: u16, message: String },
    #[error("transport failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth failure: {0}")]
    Auth(#[from] AuthError),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes`, using `suggested_name` as the file name.
    async fn put(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<Doodle, StoreError>;

    /// All doodles, newest first.
    async fn list(&self) -> Result<Vec<Doodle>, StoreError>;

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub async fn build_store(
    cfg: &Config,
    credentials: Arc<dyn CredentialProvider>,
    http: reqwest::Client,
) -> anyhow::Result<Arc<dyn BlobStore>> {
    let drive = || -> anyhow::Result<DriveStore> {
        let folder_id = cfg
            .google
            .folder_id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("google.folder_id is not set"))?;
        Ok(DriveStore::new(
            http.clone(),
            credentials.clone(),
            cfg.google.api_base.clone(),
            folder_id,
            cfg.google.share_publicly,
        ))
    };

    let store: Arc<dyn BlobStore> = match cfg.backend {
        Backend::Local => Arc::new(LocalStore::new(cfg.doodle_dir()).await?),
        Backend::Drive => Arc::new(drive()?),
        Backend::Mirrored => Arc::new(MirroredStore::new(
            LocalStore::new(cfg.doodle_dir()).await?,
            drive()?,
            cfg.mirror_policy,
        )),
    };
    log::info!("using {:?} doodle store", cfg.backend);
    Ok(store)
}

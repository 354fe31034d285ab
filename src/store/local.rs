use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{BlobStore, StoreError};
use crate::models::doodle::{self, Doodle, EXTENSION};

/// URL prefix the front door serves the data directory under.
pub const STATIC_PREFIX: &str = "/data/doodles";

/// Doodles as plain files in one directory.
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        log::info!("doodle folder is ready at {}", dir.display());
        Ok(Self { dir })
    }

    fn checked_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !doodle::is_valid_filename(name) {
            return Err(StoreError::InvalidIdentifier(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    fn entry(name: String) -> Doodle {
        Doodle {
            url: format!("{STATIC_PREFIX}/{}", urlencoding::encode(&name)),
            id: name.clone(),
            name,
        }
    }
}

fn not_found_or(e: std::io::Error, name: &str) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Io(e)
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(&self, bytes: Vec<u8>, suggested_name: &str) -> Result<Doodle, StoreError> {
        let path = self.checked_path(suggested_name)?;
        // create_new: a same-millisecond name collision fails instead of overwriting
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        log::info!("doodle saved at {}", path.display());
        Ok(Self::entry(suggested_name.to_string()))
    }

    async fn list(&self) -> Result<Vec<Doodle>, StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut doodles = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(EXTENSION) {
                doodles.push(Self::entry(name));
            }
        }
        doodle::sort_newest_first(&mut doodles);
        Ok(doodles)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.checked_path(id)?;
        fs::read(&path).await.map_err(|e| not_found_or(e, id))
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.checked_path(id)?;
        fs::remove_file(&path).await.map_err(|e| not_found_or(e, id))?;
        log::info!("deleted doodle {id}");
        Ok(())
    }
}

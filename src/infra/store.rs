//! Flat-file snapshot store: one JSON document per platform.

use std::{
    io::{self, ErrorKind, Write},
    path::PathBuf,
};

use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::{fs, task};

use crate::domain::{entities::PlatformProfile, types::Platform};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot `{}` does not exist", path.display())]
    Missing { path: PathBuf },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("snapshot is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to move snapshot into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Filesystem-backed store for cached platform snapshots.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn path_for(&self, platform: Platform) -> PathBuf {
        self.root.join(platform.cache_file_name())
    }

    /// Read a snapshot as untyped JSON so callers can merge it over defaults.
    pub async fn read_value(&self, platform: Platform) -> Result<Value, StoreError> {
        let path = self.path_for(platform);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::Missing { path });
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `lastUpdated` of the current snapshot, if one exists and carries a valid timestamp.
    pub async fn last_updated(&self, platform: Platform) -> Option<OffsetDateTime> {
        let value = self.read_value(platform).await.ok()?;
        let raw = value.get("lastUpdated")?.as_str()?;
        OffsetDateTime::parse(raw, &Rfc3339).ok()
    }

    /// Replace a snapshot wholesale. Readers observe either the old or the new file.
    pub async fn write(
        &self,
        platform: Platform,
        profile: &PlatformProfile,
    ) -> Result<PathBuf, StoreError> {
        let payload = serde_json::to_vec_pretty(profile)?;
        let root = self.root.clone();
        let path = self.path_for(platform);

        task::spawn_blocking(move || -> Result<PathBuf, StoreError> {
            std::fs::create_dir_all(&root)?;
            let mut file = NamedTempFile::new_in(&root)?;
            file.write_all(&payload)?;
            file.as_file().sync_all()?;
            file.persist(&path)?;
            Ok(path)
        })
        .await
        .map_err(|err| StoreError::Io(io::Error::other(err)))?
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! File-backed cluster state
//!
//! Layout under the state directory:
//!
//! ```text
//! claims/<anything>.yaml   one StorageClaim per file, written by operators
//! volumes/<name>.json      one VolumeDescriptor per file, written by the controller
//! ```
//!
//! Deleting a claim file releases the volume bound to it. Volume files are
//! replaced atomically (write to a temporary file, then rename).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::domain::cluster::{ClusterState, ClusterStateError, StorageClaim};
use crate::domain::volume::VolumeDescriptor;

pub struct FileClusterState {
    claims_dir: PathBuf,
    volumes_dir: PathBuf,
}

impl FileClusterState {
    /// Open (and create if needed) the state directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, ClusterStateError> {
        let dir = dir.as_ref();
        let claims_dir = dir.join("claims");
        let volumes_dir = dir.join("volumes");
        tokio::fs::create_dir_all(&claims_dir).await?;
        tokio::fs::create_dir_all(&volumes_dir).await?;
        Ok(Self {
            claims_dir,
            volumes_dir,
        })
    }

    fn volume_path(&self, name: &str) -> Result<PathBuf, ClusterStateError> {
        if name.is_empty() || name.contains('/') || name.starts_with('.') {
            return Err(ClusterStateError::Malformed {
                path: name.to_string(),
                reason: "volume name is not a valid file name".to_string(),
            });
        }
        Ok(self.volumes_dir.join(format!("{name}.json")))
    }

    async fn files_with_extension(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, ClusterStateError> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.contains(&ext))
                .unwrap_or(false);
            if matches && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_claims(&self) -> Result<Vec<(PathBuf, StorageClaim)>, ClusterStateError> {
        let mut claims = Vec::new();
        for path in Self::files_with_extension(&self.claims_dir, &["yaml", "yml"]).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_yaml::from_str::<StorageClaim>(&content) {
                Ok(claim) => claims.push((path, claim)),
                Err(e) => warn!("Skipping malformed claim file {}: {}", path.display(), e),
            }
        }
        Ok(claims)
    }

    async fn write_atomically(path: &Path, content: &[u8]) -> Result<(), ClusterStateError> {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ClusterState for FileClusterState {
    async fn list_claims(&self) -> Result<Vec<StorageClaim>, ClusterStateError> {
        Ok(self.read_claims().await?.into_iter().map(|(_, claim)| claim).collect())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeDescriptor>, ClusterStateError> {
        let mut volumes = Vec::new();
        for path in Self::files_with_extension(&self.volumes_dir, &["json"]).await? {
            let content = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<VolumeDescriptor>(&content) {
                Ok(volume) => volumes.push(volume),
                Err(e) => warn!("Skipping malformed volume file {}: {}", path.display(), e),
            }
        }
        Ok(volumes)
    }

    async fn get_volume(&self, name: &str) -> Result<Option<VolumeDescriptor>, ClusterStateError> {
        let path = self.volume_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_volume(&self, volume: &VolumeDescriptor) -> Result<(), ClusterStateError> {
        let path = self.volume_path(&volume.name)?;
        let content = serde_json::to_vec_pretty(volume)?;
        Self::write_atomically(&path, &content).await
    }

    async fn delete_volume(&self, name: &str) -> Result<(), ClusterStateError> {
        let path = self.volume_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn bind_claim(&self, key: &str, volume_name: &str) -> Result<(), ClusterStateError> {
        let (path, mut claim) = self
            .read_claims()
            .await?
            .into_iter()
            .find(|(_, claim)| claim.key() == key)
            .ok_or_else(|| ClusterStateError::ClaimNotFound(key.to_string()))?;

        claim.volume_name = Some(volume_name.to_string());
        let content = serde_yaml::to_string(&claim)?;
        Self::write_atomically(&path, content.as_bytes()).await
    }
}

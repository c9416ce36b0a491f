// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Mounted CephFS Gateway
//!
//! Operates on a CephFS filesystem mounted on the provisioner host (kernel or
//! FUSE client, mounted with the admin principal). Namespace paths are
//! resolved below the mount root; a namespace is a plain directory.
//!
//! **Limitations:**
//! - No quota enforcement (kernel CephFS ignores `ceph.quota.*` on older clients)
//! - The mount itself is managed outside the provisioner

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::domain::gateway::{BackingStoreGateway, CephConnection, GatewayError};

pub struct MountedCephFsGateway {
    /// Local mount point of the CephFS root (e.g. "/mnt/cephfs")
    mount_root: PathBuf,
    connection: CephConnection,
}

impl MountedCephFsGateway {
    pub fn new(mount_root: impl Into<PathBuf>, connection: CephConnection) -> Self {
        Self {
            mount_root: mount_root.into(),
            connection,
        }
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    /// Resolve a namespace path below the mount root
    ///
    /// Leading slashes are ignored; `..`, empty and root-only paths are rejected.
    fn resolve_path(&self, path: &str) -> Result<PathBuf, GatewayError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.mount_root.clone();
        let mut depth = 0usize;

        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    resolved.push(segment);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => {
                    return Err(GatewayError::InvalidPath(format!(
                        "{path} escapes the filesystem root"
                    )))
                }
            }
        }

        if depth == 0 {
            return Err(GatewayError::InvalidPath(format!(
                "'{path}' does not name a namespace"
            )));
        }

        Ok(resolved)
    }
}

#[async_trait]
impl BackingStoreGateway for MountedCephFsGateway {
    async fn create_namespace(&self, path: &str) -> Result<(), GatewayError> {
        let fs_path = self.resolve_path(path)?;

        if tokio::fs::try_exists(&fs_path).await? {
            return Err(GatewayError::AlreadyExists(path.to_string()));
        }

        debug!("Creating namespace {} at {}", path, fs_path.display());
        tokio::fs::create_dir_all(&fs_path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => GatewayError::PermissionDenied(path.to_string()),
                _ => GatewayError::Io(format!("Failed to create namespace {}: {}", path, e)),
            })
    }

    async fn remove_namespace(&self, path: &str, recursive: bool) -> Result<(), GatewayError> {
        let fs_path = self.resolve_path(path)?;

        debug!(
            "Removing namespace {} at {} (recursive: {})",
            path,
            fs_path.display(),
            recursive
        );
        let result = if recursive {
            tokio::fs::remove_dir_all(&fs_path).await
        } else {
            tokio::fs::remove_dir(&fs_path).await
        };

        result.map_err(|e| match e.kind() {
            ErrorKind::NotFound => GatewayError::NotFound(path.to_string()),
            ErrorKind::DirectoryNotEmpty => GatewayError::NotEmpty(path.to_string()),
            ErrorKind::PermissionDenied => GatewayError::PermissionDenied(path.to_string()),
            _ => GatewayError::Io(format!("Failed to remove namespace {}: {}", path, e)),
        })
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        let metadata = tokio::fs::metadata(&self.mount_root).await.map_err(|e| {
            GatewayError::Unavailable(format!(
                "Mount root {} is not accessible: {}",
                self.mount_root.display(),
                e
            ))
        })?;
        if !metadata.is_dir() {
            return Err(GatewayError::Unavailable(format!(
                "Mount root {} is not a directory",
                self.mount_root.display()
            )));
        }

        let marker = self.mount_root.join(".cephfs-provisioner-health");
        tokio::fs::write(&marker, b"health-check")
            .await
            .map_err(|e| GatewayError::Unavailable(format!("Mount root is not writable: {}", e)))?;
        tokio::fs::remove_file(&marker).await?;

        Ok(())
    }

    fn connection(&self) -> &CephConnection {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::volume::SecretReference;
    use tempfile::TempDir;

    fn gateway(root: &Path) -> MountedCephFsGateway {
        MountedCephFsGateway::new(
            root,
            CephConnection {
                monitors: vec!["10.0.0.1:6789".to_string()],
                admin: "admin".to_string(),
                secret_ref: SecretReference {
                    name: "ceph-secret-admin".to_string(),
                    namespace: None,
                },
            },
        )
    }

    #[tokio::test]
    async fn test_create_and_remove_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let gateway = gateway(temp_dir.path());

        gateway.create_namespace("/volumes/kubernetes/pvc-1").await.unwrap();
        let fs_path = temp_dir.path().join("volumes/kubernetes/pvc-1");
        assert!(fs_path.is_dir());

        std::fs::write(fs_path.join("data.bin"), b"payload").unwrap();

        gateway
            .remove_namespace("/volumes/kubernetes/pvc-1", true)
            .await
            .unwrap();
        assert!(!fs_path.exists());
        assert!(temp_dir.path().join("volumes/kubernetes").is_dir());
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let temp_dir = TempDir::new().unwrap();
        let gateway = gateway(temp_dir.path());

        gateway.create_namespace("root/pvc-1").await.unwrap();
        let result = gateway.create_namespace("root/pvc-1").await;
        assert!(matches!(result, Err(GatewayError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_reports_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let gateway = gateway(temp_dir.path());

        let result = gateway.remove_namespace("/volumes/pvc-missing", true).await;
        assert!(matches!(result, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_non_recursive_remove_keeps_contents() {
        let temp_dir = TempDir::new().unwrap();
        let gateway = gateway(temp_dir.path());

        gateway.create_namespace("/volumes/pvc-1").await.unwrap();
        std::fs::write(temp_dir.path().join("volumes/pvc-1/file"), b"x").unwrap();

        let result = gateway.remove_namespace("/volumes/pvc-1", false).await;
        assert!(matches!(result, Err(GatewayError::NotEmpty(_))));
        assert!(temp_dir.path().join("volumes/pvc-1/file").exists());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let temp_dir = TempDir::new().unwrap();
        let gateway = gateway(temp_dir.path());

        for bad in ["/volumes/../../etc", "..", "/", ""] {
            let result = gateway.create_namespace(bad).await;
            assert!(
                matches!(result, Err(GatewayError::InvalidPath(_))),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let temp_dir = TempDir::new().unwrap();
        gateway(temp_dir.path()).health_check().await.unwrap();

        let missing = gateway(&temp_dir.path().join("not-mounted"));
        assert!(matches!(
            missing.health_check().await,
            Err(GatewayError::Unavailable(_))
        ));
    }
}

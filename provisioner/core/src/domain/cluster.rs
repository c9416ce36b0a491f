// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Cluster State
//!
//! The controller's view of the cluster: storage claims it may have to
//! satisfy and the volume descriptors it has persisted. The trait is defined
//! here and implemented in `crate::infrastructure::cluster_state`.
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | `InMemoryClusterState` | process memory (tests, dry runs) |
//! | `FileClusterState` | `claims/*.yaml` + `volumes/*.json` under a state directory |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::volume::{AccessMode, ClaimReference, ReclaimPolicy, ResourceList, VolumeDescriptor};

/// A consumer's request for storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClaim {
    pub namespace: String,
    pub name: String,
    pub uid: String,
    /// Provisioner name selected through the claim's storage class
    pub provisioner: String,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default)]
    pub requests: ResourceList,
    /// Reclaim policy of the storage class
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    /// Name of the volume the claim is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
}

impl StorageClaim {
    pub fn reference(&self) -> ClaimReference {
        ClaimReference::new(&self.namespace, &self.name, &self.uid)
    }

    /// `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Deterministic volume name for this claim
    pub fn volume_name_for(&self) -> String {
        format!("pvc-{}", self.uid)
    }

    pub fn is_bound(&self) -> bool {
        self.volume_name.is_some()
    }
}

#[async_trait]
pub trait ClusterState: Send + Sync {
    async fn list_claims(&self) -> Result<Vec<StorageClaim>, ClusterStateError>;

    async fn list_volumes(&self) -> Result<Vec<VolumeDescriptor>, ClusterStateError>;

    async fn get_volume(&self, name: &str) -> Result<Option<VolumeDescriptor>, ClusterStateError>;

    /// Create or replace a volume descriptor
    async fn save_volume(&self, volume: &VolumeDescriptor) -> Result<(), ClusterStateError>;

    /// Forget a volume descriptor; absent volumes are not an error
    async fn delete_volume(&self, name: &str) -> Result<(), ClusterStateError>;

    /// Record that the claim identified by `key` is bound to `volume_name`
    async fn bind_claim(&self, key: &str, volume_name: &str) -> Result<(), ClusterStateError>;
}

#[derive(Debug, Error)]
pub enum ClusterStateError {
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Malformed record {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ClusterStateError {
    fn from(err: serde_json::Error) -> Self {
        ClusterStateError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for ClusterStateError {
    fn from(err: serde_yaml::Error) -> Self {
        ClusterStateError::Serialization(err.to_string())
    }
}

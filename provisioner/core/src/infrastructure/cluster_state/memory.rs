// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::domain::cluster::{ClusterState, ClusterStateError, StorageClaim};
use crate::domain::volume::VolumeDescriptor;

/// Cluster state held in process memory
#[derive(Default)]
pub struct InMemoryClusterState {
    claims: RwLock<BTreeMap<String, StorageClaim>>,
    volumes: RwLock<BTreeMap<String, VolumeDescriptor>>,
}

impl InMemoryClusterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a claim
    pub fn add_claim(&self, claim: StorageClaim) {
        self.claims.write().insert(claim.key(), claim);
    }

    /// Remove a claim, releasing any volume bound to it
    pub fn remove_claim(&self, key: &str) -> Option<StorageClaim> {
        self.claims.write().remove(key)
    }

    pub fn claim(&self, key: &str) -> Option<StorageClaim> {
        self.claims.read().get(key).cloned()
    }

    pub fn volume(&self, name: &str) -> Option<VolumeDescriptor> {
        self.volumes.read().get(name).cloned()
    }
}

#[async_trait]
impl ClusterState for InMemoryClusterState {
    async fn list_claims(&self) -> Result<Vec<StorageClaim>, ClusterStateError> {
        Ok(self.claims.read().values().cloned().collect())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeDescriptor>, ClusterStateError> {
        Ok(self.volumes.read().values().cloned().collect())
    }

    async fn get_volume(&self, name: &str) -> Result<Option<VolumeDescriptor>, ClusterStateError> {
        Ok(self.volume(name))
    }

    async fn save_volume(&self, volume: &VolumeDescriptor) -> Result<(), ClusterStateError> {
        self.volumes.write().insert(volume.name.clone(), volume.clone());
        Ok(())
    }

    async fn delete_volume(&self, name: &str) -> Result<(), ClusterStateError> {
        self.volumes.write().remove(name);
        Ok(())
    }

    async fn bind_claim(&self, key: &str, volume_name: &str) -> Result<(), ClusterStateError> {
        let mut claims = self.claims.write();
        let claim = claims
            .get_mut(key)
            .ok_or_else(|| ClusterStateError::ClaimNotFound(key.to_string()))?;
        claim.volume_name = Some(volume_name.to_string());
        Ok(())
    }
}

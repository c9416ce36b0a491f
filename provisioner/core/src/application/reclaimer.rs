// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Reclaimer
//!
//! Removes the backing namespace of a released volume, but only when the
//! volume carries this instance's identity. A volume stamped by another
//! instance is left alone: that instance may still be running and owns it.

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::gateway::{BackingStoreGateway, GatewayError};
use crate::domain::identity::ProvisionerIdentity;
use crate::domain::provisioner::ProvisionError;
use crate::domain::volume::{namespace_path, validate_volume_name, VolumeDescriptor};

/// Result of a reclamation that touched storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaimed {
    /// The namespace existed and was removed
    Removed,
    /// The namespace was already gone
    AlreadyAbsent,
}

pub struct VolumeReclaimer {
    identity: ProvisionerIdentity,
    gateway: Arc<dyn BackingStoreGateway>,
    root_path: String,
}

impl VolumeReclaimer {
    pub fn new(
        identity: ProvisionerIdentity,
        gateway: Arc<dyn BackingStoreGateway>,
        root_path: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            gateway,
            root_path: root_path.into(),
        }
    }

    /// Check ownership of `volume` without touching storage
    pub fn check_ownership(&self, volume: &VolumeDescriptor) -> Result<(), ProvisionError> {
        let owner = volume
            .identity_annotation()
            .ok_or_else(|| ProvisionError::MissingIdentity(volume.name.clone()))?;

        if !self.identity.owns(owner) {
            return Err(ProvisionError::Ignored {
                volume: volume.name.clone(),
            });
        }
        Ok(())
    }

    /// Remove the backing namespace of `volume`
    pub async fn reclaim(&self, volume: &VolumeDescriptor) -> Result<Reclaimed, ProvisionError> {
        self.check_ownership(volume)?;
        validate_volume_name(&volume.name)?;

        let path = namespace_path(&self.root_path, &volume.name);
        debug!("Removing namespace {} of volume {}", path, volume.name);

        match self.gateway.remove_namespace(&path, true).await {
            Ok(()) => {
                info!("Removed namespace {} of volume {}", path, volume.name);
                Ok(Reclaimed::Removed)
            }
            Err(GatewayError::NotFound(_)) => {
                debug!("Namespace {} already absent", path);
                Ok(Reclaimed::AlreadyAbsent)
            }
            Err(source) => Err(ProvisionError::Reclaim { path, source }),
        }
    }
}

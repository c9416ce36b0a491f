// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! CephFS Provisioner Application Service
//!
//! Composes the allocator and reclaimer behind the [`Provisioner`] contract:
//! - Domain layer: VolumeRequest, VolumeDescriptor, BackingStoreGateway trait
//! - Event bus: publishing VolumeEvents for observability
//!
//! Every instance owns one [`ProvisionerIdentity`] for its whole lifetime.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::allocator::VolumeAllocator;
use crate::application::reclaimer::{Reclaimed, VolumeReclaimer};
use crate::domain::events::VolumeEvent;
use crate::domain::gateway::BackingStoreGateway;
use crate::domain::identity::ProvisionerIdentity;
use crate::domain::provisioner::{ProvisionError, Provisioner};
use crate::domain::volume::{namespace_path, VolumeDescriptor, VolumeRequest};
use crate::infrastructure::event_bus::EventBus;

pub struct CephFsProvisioner {
    identity: ProvisionerIdentity,
    root_path: String,
    allocator: VolumeAllocator,
    reclaimer: VolumeReclaimer,
    event_bus: Arc<EventBus>,
}

impl CephFsProvisioner {
    pub fn new(
        identity: ProvisionerIdentity,
        gateway: Arc<dyn BackingStoreGateway>,
        root_path: impl Into<String>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let root_path = root_path.into();
        Self {
            allocator: VolumeAllocator::new(identity.clone(), gateway.clone(), root_path.clone()),
            reclaimer: VolumeReclaimer::new(identity.clone(), gateway, root_path.clone()),
            identity,
            root_path,
            event_bus,
        }
    }

    pub fn identity(&self) -> &ProvisionerIdentity {
        &self.identity
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }
}

#[async_trait]
impl Provisioner for CephFsProvisioner {
    async fn provision(&self, request: &VolumeRequest) -> Result<VolumeDescriptor, ProvisionError> {
        info!(
            "Provisioning volume {} for claim {}",
            request.pv_name,
            request.claim_ref.key()
        );

        match self.allocator.allocate(request).await {
            Ok(volume) => {
                info!(
                    "Provisioned volume {} at {}",
                    volume.name, volume.cephfs.path
                );
                self.event_bus
                    .publish_volume_event(VolumeEvent::VolumeProvisioned {
                        volume: volume.name.clone(),
                        claim: request.claim_ref.key(),
                        path: volume.cephfs.path.clone(),
                        capacity: volume.storage_capacity().map(|q| q.as_str().to_string()),
                        provisioned_at: Utc::now(),
                    });
                Ok(volume)
            }
            Err(e) => {
                error!("Failed to provision volume {}: {}", request.pv_name, e);
                self.event_bus.publish_volume_event(VolumeEvent::ProvisionFailed {
                    volume: request.pv_name.clone(),
                    claim: request.claim_ref.key(),
                    error: e.to_string(),
                    failed_at: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn delete(&self, volume: &VolumeDescriptor) -> Result<(), ProvisionError> {
        info!("Deleting volume {}", volume.name);

        match self.reclaimer.reclaim(volume).await {
            Ok(outcome) => {
                if outcome == Reclaimed::AlreadyAbsent {
                    info!("Namespace of volume {} was already removed", volume.name);
                }
                self.event_bus.publish_volume_event(VolumeEvent::VolumeDeleted {
                    volume: volume.name.clone(),
                    path: namespace_path(&self.root_path, &volume.name),
                    deleted_at: Utc::now(),
                });
                Ok(())
            }
            Err(e) if e.is_ignored() => {
                let owner = volume.identity_annotation().unwrap_or_default().to_string();
                warn!(
                    "Volume {} belongs to provisioner {}, not {}; leaving it alone",
                    volume.name, owner, self.identity
                );
                self.event_bus.publish_volume_event(VolumeEvent::DeleteIgnored {
                    volume: volume.name.clone(),
                    owner,
                    ignored_at: Utc::now(),
                });
                Err(e)
            }
            Err(e) => {
                error!("Failed to delete volume {}: {}", volume.name, e);
                self.event_bus.publish_volume_event(VolumeEvent::DeleteFailed {
                    volume: volume.name.clone(),
                    error: e.to_string(),
                    failed_at: Utc::now(),
                });
                Err(e)
            }
        }
    }
}

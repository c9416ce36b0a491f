// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Allocator
//!
//! Turns a [`VolumeRequest`] into a backing namespace on CephFS plus a
//! [`VolumeDescriptor`] stamped with this instance's identity.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::gateway::{BackingStoreGateway, GatewayError};
use crate::domain::identity::{ProvisionerIdentity, IDENTITY_ANNOTATION};
use crate::domain::provisioner::ProvisionError;
use crate::domain::volume::{
    namespace_path, CephFsVolumeSource, ResourceList, VolumeDescriptor, VolumePhase,
    VolumeRequest, STORAGE_RESOURCE,
};

pub struct VolumeAllocator {
    identity: ProvisionerIdentity,
    gateway: Arc<dyn BackingStoreGateway>,
    root_path: String,
}

impl VolumeAllocator {
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

    /// Create the backing namespace for `request` and describe it
    ///
    /// Validation happens before any gateway call. On failure no descriptor
    /// is returned. A namespace that already exists is reused: the volume
    /// name is derived from the claim, so an existing namespace can only come
    /// from an earlier attempt whose descriptor was never persisted.
    pub async fn allocate(&self, request: &VolumeRequest) -> Result<VolumeDescriptor, ProvisionError> {
        let capacity = request.validate()?.clone();
        let path = namespace_path(&self.root_path, &request.pv_name);

        debug!("Allocating namespace {} for volume {}", path, request.pv_name);
        match self.gateway.create_namespace(&path).await {
            Ok(()) => {}
            Err(GatewayError::AlreadyExists(_)) => {
                warn!(
                    "Namespace {} already exists, reusing it for volume {}",
                    path, request.pv_name
                );
            }
            Err(source) => return Err(ProvisionError::Allocation { path, source }),
        }

        let connection = self.gateway.connection();
        Ok(VolumeDescriptor {
            name: request.pv_name.clone(),
            annotations: BTreeMap::from([(
                IDENTITY_ANNOTATION.to_string(),
                self.identity.as_str().to_string(),
            )]),
            capacity: ResourceList::from([(STORAGE_RESOURCE.to_string(), capacity)]),
            access_modes: request.access_modes.clone(),
            reclaim_policy: request.reclaim_policy,
            cephfs: CephFsVolumeSource {
                monitors: connection.monitors.clone(),
                path,
                user: connection.admin.clone(),
                secret_ref: connection.secret_ref.clone(),
            },
            claim_ref: None,
            phase: VolumePhase::Available,
        })
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `provision` - one-shot allocation
//!
//! Allocates a single volume with a fresh identity and prints the descriptor
//! as JSON. Only this process's identity could reclaim it, so the printed
//! descriptor is mostly useful for inspecting what the controller would store.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use cephfs_provisioner_core::application::CephFsProvisioner;
use cephfs_provisioner_core::domain::identity::ProvisionerIdentity;
use cephfs_provisioner_core::domain::provisioner::Provisioner;
use cephfs_provisioner_core::domain::provisioner_config::ProvisionerConfigManifest;
use cephfs_provisioner_core::domain::volume::{
    AccessMode, ClaimReference, Quantity, ReclaimPolicy, ResourceList, VolumeRequest,
    STORAGE_RESOURCE,
};
use cephfs_provisioner_core::infrastructure::event_bus::EventBus;
use cephfs_provisioner_core::infrastructure::gateway::create_gateway;

#[derive(Args, Debug, Clone)]
pub struct ProvisionArgs {
    /// Volume name (single path segment, e.g. pvc-<uid>)
    #[arg(long)]
    pub name: String,

    /// Requested capacity (e.g. 5Gi)
    #[arg(long)]
    pub capacity: String,

    /// Access mode; repeat for several (ReadWriteOnce/RWO, ReadOnlyMany/ROX, ReadWriteMany/RWX)
    #[arg(long = "access-mode", default_value = "ReadWriteOnce")]
    pub access_modes: Vec<String>,

    /// Reclaim policy (Delete, Retain)
    #[arg(long, default_value = "Delete")]
    pub reclaim_policy: String,

    /// Namespace of the claim recorded on the request
    #[arg(long, default_value = "default")]
    pub claim_namespace: String,
}

impl ProvisionArgs {
    pub fn to_request(&self) -> Result<VolumeRequest> {
        let capacity = Quantity::parse(self.capacity.as_str()).context("Invalid --capacity")?;
        let access_modes = self
            .access_modes
            .iter()
            .map(|mode| mode.parse::<AccessMode>())
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid --access-mode")?;
        let reclaim_policy = self
            .reclaim_policy
            .parse::<ReclaimPolicy>()
            .context("Invalid --reclaim-policy")?;

        Ok(VolumeRequest {
            pv_name: self.name.clone(),
            reclaim_policy,
            access_modes,
            capacity: ResourceList::from([(STORAGE_RESOURCE.to_string(), capacity)]),
            claim_ref: ClaimReference::new(
                &self.claim_namespace,
                &self.name,
                uuid::Uuid::new_v4().to_string(),
            ),
        })
    }
}

pub async fn handle_command(args: ProvisionArgs, config_override: Option<PathBuf>) -> Result<()> {
    let config = ProvisionerConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    let spec = &config.spec;

    let request = args.to_request()?;
    let provisioner = CephFsProvisioner::new(
        ProvisionerIdentity::generate(),
        create_gateway(&spec.gateway, spec.ceph.connection()),
        spec.ceph.root_path.clone(),
        Arc::new(EventBus::with_default_capacity()),
    );

    let volume = provisioner
        .provision(&request)
        .await
        .with_context(|| format!("Failed to provision volume {}", request.pv_name))?;

    println!("{}", serde_json::to_string_pretty(&volume)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ProvisionArgs {
        ProvisionArgs {
            name: "pvc-abc123".to_string(),
            capacity: "5Gi".to_string(),
            access_modes: vec!["RWX".to_string(), "ReadOnlyMany".to_string()],
            reclaim_policy: "Retain".to_string(),
            claim_namespace: "team-a".to_string(),
        }
    }

    #[test]
    fn test_args_to_request() {
        let request = args().to_request().unwrap();

        assert_eq!(request.pv_name, "pvc-abc123");
        assert_eq!(request.storage_request().unwrap().as_str(), "5Gi");
        assert_eq!(
            request.access_modes,
            vec![AccessMode::ReadWriteMany, AccessMode::ReadOnlyMany]
        );
        assert_eq!(request.reclaim_policy, ReclaimPolicy::Retain);
        assert_eq!(request.claim_ref.key(), "team-a/pvc-abc123");
    }

    #[test]
    fn test_args_reject_bad_values() {
        let mut bad_capacity = args();
        bad_capacity.capacity = "lots".to_string();
        assert!(bad_capacity.to_request().is_err());

        let mut bad_mode = args();
        bad_mode.access_modes = vec!["ReadWriteSometimes".to_string()];
        assert!(bad_mode.to_request().is_err());

        let mut bad_policy = args();
        bad_policy.reclaim_policy = "Recycle".to_string();
        assert!(bad_policy.to_request().is_err());
    }
}

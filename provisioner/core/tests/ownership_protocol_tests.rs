// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the allocate/reclaim ownership protocol
//!
//! These tests verify:
//! 1. Allocation stamps the instance identity and echoes the request
//! 2. Reclamation abstains on foreign volumes without touching storage
//! 3. Reclamation is idempotent
//! 4. The identity annotation survives persistence and is read back by the same key

use cephfs_provisioner_core::application::CephFsProvisioner;
use cephfs_provisioner_core::domain::gateway::{BackingStoreGateway, CephConnection};
use cephfs_provisioner_core::domain::identity::{ProvisionerIdentity, IDENTITY_ANNOTATION};
use cephfs_provisioner_core::domain::provisioner::{ProvisionError, Provisioner};
use cephfs_provisioner_core::domain::volume::{
    AccessMode, ClaimReference, Quantity, ReclaimPolicy, ResourceList, SecretReference,
    VolumeDescriptor, VolumeError, VolumeRequest, STORAGE_RESOURCE,
};
use cephfs_provisioner_core::infrastructure::event_bus::EventBus;
use cephfs_provisioner_core::infrastructure::gateway::{InMemoryGateway, MountedCephFsGateway};
use std::sync::Arc;

fn connection() -> CephConnection {
    CephConnection {
        monitors: vec!["10.0.0.1:6789".to_string()],
        admin: "admin".to_string(),
        secret_ref: SecretReference {
            name: "ceph-secret-admin".to_string(),
            namespace: Some("kube-system".to_string()),
        },
    }
}

fn provisioner(identity: &str, gateway: Arc<dyn BackingStoreGateway>) -> CephFsProvisioner {
    CephFsProvisioner::new(
        ProvisionerIdentity::from_string(identity),
        gateway,
        "root",
        Arc::new(EventBus::with_default_capacity()),
    )
}

fn abc123_request() -> VolumeRequest {
    VolumeRequest {
        pv_name: "pvc-abc123".to_string(),
        reclaim_policy: ReclaimPolicy::Delete,
        access_modes: vec![AccessMode::ReadWriteMany],
        capacity: ResourceList::from([(
            STORAGE_RESOURCE.to_string(),
            Quantity::parse("5Gi").unwrap(),
        )]),
        claim_ref: ClaimReference::new("default", "data", "abc123"),
    }
}

#[tokio::test]
async fn test_provision_then_delete_by_same_instance() {
    let gateway = Arc::new(InMemoryGateway::new(connection()));
    let i1 = provisioner("I1", gateway.clone());

    let volume = i1.provision(&abc123_request()).await.unwrap();
    assert_eq!(volume.name, "pvc-abc123");
    assert_eq!(volume.storage_capacity().unwrap().as_str(), "5Gi");
    assert_eq!(volume.annotation(IDENTITY_ANNOTATION), Some("I1"));
    assert_eq!(volume.access_modes, vec![AccessMode::ReadWriteMany]);
    assert_eq!(volume.reclaim_policy, ReclaimPolicy::Delete);
    assert!(gateway.contains("root/pvc-abc123"));

    i1.delete(&volume).await.unwrap();
    assert!(!gateway.contains("root/pvc-abc123"));
}

#[tokio::test]
async fn test_delete_of_foreign_volume_is_ignored() {
    let gateway = Arc::new(InMemoryGateway::new(connection()));
    let i2 = provisioner("I2", gateway.clone());
    let volume = i2.provision(&abc123_request()).await.unwrap();

    let i1 = provisioner("I1", gateway.clone());
    let err = i1.delete(&volume).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Ignored { ref volume } if volume == "pvc-abc123"));
    assert_eq!(gateway.remove_calls(), 0);
    assert!(gateway.contains("root/pvc-abc123"));
}

#[tokio::test]
async fn test_second_delete_is_noop() {
    let gateway = Arc::new(InMemoryGateway::new(connection()));
    let i1 = provisioner("I1", gateway.clone());
    let volume = i1.provision(&abc123_request()).await.unwrap();

    i1.delete(&volume).await.unwrap();
    i1.delete(&volume).await.unwrap();
    assert!(gateway.namespaces().is_empty());
}

#[tokio::test]
async fn test_missing_capacity_has_no_side_effects() {
    let gateway = Arc::new(InMemoryGateway::new(connection()));
    let i1 = provisioner("I1", gateway.clone());
    let mut request = abc123_request();
    request.capacity.clear();

    let err = i1.provision(&request).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Validation(VolumeError::MissingCapacity)));
    assert_eq!(gateway.create_calls(), 0);
    assert!(gateway.namespaces().is_empty());
}

#[tokio::test]
async fn test_identity_annotation_round_trip() {
    let gateway = Arc::new(InMemoryGateway::new(connection()));
    let instance = CephFsProvisioner::new(
        ProvisionerIdentity::generate(),
        gateway.clone(),
        "root",
        Arc::new(EventBus::with_default_capacity()),
    );

    let volume = instance.provision(&abc123_request()).await.unwrap();

    let json = serde_json::to_string(&volume).unwrap();
    assert!(json.contains(&format!("\"{IDENTITY_ANNOTATION}\"")));
    let restored: VolumeDescriptor = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, volume);
    assert!(restored.is_owned_by(instance.identity()));

    instance.delete(&restored).await.unwrap();
    assert!(!gateway.contains("root/pvc-abc123"));
    assert_eq!(gateway.remove_calls(), 1);
}

#[tokio::test]
async fn test_mounted_gateway_round_trip() {
    let mount = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn BackingStoreGateway> =
        Arc::new(MountedCephFsGateway::new(mount.path(), connection()));
    let i1 = provisioner("I1", gateway.clone());
    let backing_dir = mount.path().join("root/pvc-abc123");

    let volume = i1.provision(&abc123_request()).await.unwrap();
    assert!(backing_dir.is_dir());
    std::fs::write(backing_dir.join("data.bin"), b"payload").unwrap();
    std::fs::create_dir_all(backing_dir.join("nested/deeper")).unwrap();

    let i2 = provisioner("I2", gateway.clone());
    assert!(i2.delete(&volume).await.unwrap_err().is_ignored());
    assert!(backing_dir.join("data.bin").exists());

    i1.delete(&volume).await.unwrap();
    assert!(!backing_dir.exists());
    assert!(mount.path().join("root").is_dir());

    i1.delete(&volume).await.unwrap();
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::domain::identity::{ProvisionerIdentity, IDENTITY_ANNOTATION};

/// Resource key under which the requested capacity is recorded
pub const STORAGE_RESOURCE: &str = "storage";

/// Annotation stamped by the controller naming the provisioner that created a volume
pub const PROVISIONED_BY_ANNOTATION: &str = "pv.kubernetes.io/provisioned-by";

// ============================================================================
// Value Objects
// ============================================================================

/// Resource quantity in Kubernetes notation (e.g. "5Gi", "500M", "1024")
///
/// Accepts binary (`Ki`..`Ei`) and decimal (`m`, `k`..`E`) suffixes as well
/// as decimal exponents (`1e3`, `5E2`). A bare `E` is exa, not an exponent.
///
/// Capacity is advisory for CephFS volumes: kernel CephFS does not enforce
/// quotas, so the value is only validated and carried through to the
/// descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity(String);

impl Quantity {
    /// Parse and validate a quantity string
    pub fn parse(value: impl Into<String>) -> Result<Self, VolumeError> {
        let value = value.into();
        parse_quantity_bytes(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Size in bytes, rounded up to the next whole byte
    pub fn to_bytes(&self) -> u64 {
        // Validated on construction
        parse_quantity_bytes(&self.0).unwrap_or(0)
    }
}

impl TryFrom<String> for Quantity {
    type Error = VolumeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Quantity> for String {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_quantity_bytes(value: &str) -> Result<u64, VolumeError> {
    let invalid = || VolumeError::InvalidQuantity(value.to_string());

    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, suffix) = value.split_at(split);
    if number.is_empty() || number.starts_with('.') || number.ends_with('.') {
        return Err(invalid());
    }

    // bytes = number * multiplier / divisor
    let (multiplier, divisor): (u64, u64) = match suffix {
        "" => (1, 1),
        "m" => (1, 1_000),
        "k" => (1_000, 1),
        "M" => (1_000_000, 1),
        "G" => (1_000_000_000, 1),
        "T" => (1_000_000_000_000, 1),
        "P" => (1_000_000_000_000_000, 1),
        "E" => (1_000_000_000_000_000_000, 1),
        "Ki" => (1 << 10, 1),
        "Mi" => (1 << 20, 1),
        "Gi" => (1 << 30, 1),
        "Ti" => (1 << 40, 1),
        "Pi" => (1 << 50, 1),
        "Ei" => (1 << 60, 1),
        _ => {
            let exponent = decimal_exponent(suffix).ok_or_else(invalid)?;
            let scale = 10u64
                .checked_pow(exponent.unsigned_abs())
                .ok_or_else(invalid)?;
            if exponent >= 0 {
                (scale, 1)
            } else {
                (1, scale)
            }
        }
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .map(|scaled| scaled.div_ceil(divisor))
            .ok_or_else(invalid);
    }

    let fractional: f64 = number.parse().map_err(|_| invalid())?;
    let bytes = (fractional * multiplier as f64 / divisor as f64).ceil();
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(bytes as u64)
}

/// Exponent of an `e`/`E` suffix such as `e3` or `E-2`
fn decimal_exponent(suffix: &str) -> Option<i32> {
    let exponent = suffix.strip_prefix(['e', 'E'])?;
    let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    exponent.parse().ok()
}

/// Resource name to quantity map
pub type ResourceList = BTreeMap<String, Quantity>;

/// Volume access mode as understood by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// Read-write by a single node
    ReadWriteOnce,
    /// Read-only by many nodes
    ReadOnlyMany,
    /// Read-write by many nodes
    ReadWriteMany,
}

impl std::str::FromStr for AccessMode {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ReadWriteOnce" | "RWO" => Ok(Self::ReadWriteOnce),
            "ReadOnlyMany" | "ROX" => Ok(Self::ReadOnlyMany),
            "ReadWriteMany" | "RWX" => Ok(Self::ReadWriteMany),
            other => Err(VolumeError::InvalidAccessMode(other.to_string())),
        }
    }
}

/// What happens to the backing storage once the claim is released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimPolicy {
    /// Remove the backing namespace
    #[default]
    Delete,
    /// Keep the backing namespace; the volume is never handed back for reclamation
    Retain,
}

impl std::str::FromStr for ReclaimPolicy {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Delete" | "delete" => Ok(Self::Delete),
            "Retain" | "retain" => Ok(Self::Retain),
            other => Err(VolumeError::InvalidReclaimPolicy(other.to_string())),
        }
    }
}

/// Reference to the claim a volume was provisioned for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimReference {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl ClaimReference {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    /// `namespace/name` key used by the controller
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Reference to the secret holding the admin principal's key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Where a provisioned volume lives on CephFS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CephFsVolumeSource {
    /// Ceph monitor endpoints (`host:port`)
    pub monitors: Vec<String>,
    /// Namespace path relative to the CephFS root
    pub path: String,
    /// Rados user the volume is mounted as
    pub user: String,
    pub secret_ref: SecretReference,
}

/// Phase of a volume as tracked by the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumePhase {
    /// Provisioned but not yet bound
    #[default]
    Available,
    /// Bound to its claim
    Bound,
    /// Claim removed, awaiting reclamation
    Released,
    /// Reclamation abandoned after repeated failures
    Failed,
}

// ============================================================================
// Request / Descriptor
// ============================================================================

/// Input to allocation, built by the controller from a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    /// Name the provisioned volume must carry
    pub pv_name: String,
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    /// Requested resources; must contain [`STORAGE_RESOURCE`]
    #[serde(default)]
    pub capacity: ResourceList,
    pub claim_ref: ClaimReference,
}

impl VolumeRequest {
    /// Requested storage capacity, if any
    pub fn storage_request(&self) -> Option<&Quantity> {
        self.capacity.get(STORAGE_RESOURCE)
    }

    /// Check the preconditions of allocation and return the requested capacity
    pub fn validate(&self) -> Result<&Quantity, VolumeError> {
        validate_volume_name(&self.pv_name)?;
        self.storage_request().ok_or(VolumeError::MissingCapacity)
    }
}

/// A volume name must be usable as a single path segment
pub fn validate_volume_name(name: &str) -> Result<(), VolumeError> {
    if name.trim().is_empty() {
        return Err(VolumeError::InvalidName("Volume name cannot be empty".to_string()));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(VolumeError::InvalidName(format!(
            "'{name}' is not a single path segment"
        )));
    }
    Ok(())
}

/// Backing namespace path of volume `name` below `root`
pub fn namespace_path(root: &str, name: &str) -> String {
    Path::new(root).join(name).to_string_lossy().into_owned()
}

/// Portable record of a provisioned volume
///
/// Produced by allocation, persisted by the controller, and handed back
/// unchanged (apart from the controller-owned `claim_ref` and `phase`) on
/// reclamation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeDescriptor {
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub capacity: ResourceList,
    pub access_modes: Vec<AccessMode>,
    pub reclaim_policy: ReclaimPolicy,
    pub cephfs: CephFsVolumeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_ref: Option<ClaimReference>,
    #[serde(default)]
    pub phase: VolumePhase,
}

impl VolumeDescriptor {
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Identity of the provisioner instance that created this volume
    pub fn identity_annotation(&self) -> Option<&str> {
        self.annotation(IDENTITY_ANNOTATION)
    }

    /// True when the identity annotation equals `identity`
    pub fn is_owned_by(&self, identity: &ProvisionerIdentity) -> bool {
        self.identity_annotation()
            .map(|value| identity.owns(value))
            .unwrap_or(false)
    }

    pub fn storage_capacity(&self) -> Option<&Quantity> {
        self.capacity.get(STORAGE_RESOURCE)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VolumeError {
    #[error("Invalid volume name: {0}")]
    InvalidName(String),

    #[error("Missing capacity: request has no 'storage' quantity")]
    MissingCapacity,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid access mode: {0}")]
    InvalidAccessMode(String),

    #[error("Invalid reclaim policy: {0}")]
    InvalidReclaimPolicy(String),
}

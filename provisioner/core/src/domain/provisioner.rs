// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioner contract consumed by the reconciliation controller.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::gateway::GatewayError;
use crate::domain::volume::{VolumeDescriptor, VolumeError, VolumeRequest};

/// Allocate and reclaim storage for the controller
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create a backing namespace for `request` and describe it
    async fn provision(&self, request: &VolumeRequest) -> Result<VolumeDescriptor, ProvisionError>;

    /// Remove the backing namespace described by `volume`
    ///
    /// Returns [`ProvisionError::Ignored`] when `volume` belongs to another
    /// provisioner instance.
    async fn delete(&self, volume: &VolumeDescriptor) -> Result<(), ProvisionError>;
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Malformed request, rejected before any side effect
    #[error("Invalid volume request: {0}")]
    Validation(#[from] VolumeError),

    /// Namespace creation failed
    #[error("Failed to allocate namespace {path}: {source}")]
    Allocation {
        path: String,
        #[source]
        source: GatewayError,
    },

    /// Namespace removal failed
    #[error("Failed to reclaim namespace {path}: {source}")]
    Reclaim {
        path: String,
        #[source]
        source: GatewayError,
    },

    /// Descriptor carries no identity annotation
    #[error("Identity annotation not found on volume {0}")]
    MissingIdentity(String),

    /// Descriptor belongs to another provisioner instance
    #[error("Identity annotation on volume {volume} does not match ours")]
    Ignored { volume: String },
}

impl ProvisionError {
    /// The controller should stop processing the volume without recording a failure
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }

    /// A later attempt may succeed (backing-store I/O failures only)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Allocation { .. } | Self::Reclaim { .. })
    }
}

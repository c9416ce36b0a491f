// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backing Store Gateway - Anti-Corruption Layer for CephFS
//!
//! The provisioner only needs two primitives from the distributed
//! filesystem: create a namespace (directory) and remove it recursively.
//! Both are addressed by path relative to the CephFS root. Implementations
//! live in `crate::infrastructure::gateway`.
//!
//! Implementations must tolerate concurrent calls on distinct paths. Calls on
//! the same path are serialized by the controller, not by the gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::volume::SecretReference;

/// How the gateway reaches the Ceph cluster
///
/// Copied verbatim into the backend location of every descriptor so that
/// nodes can mount the volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CephConnection {
    /// Ceph monitor endpoints (`host:port`)
    pub monitors: Vec<String>,
    /// Rados admin principal
    pub admin: String,
    /// Secret holding the admin principal's key
    pub secret_ref: SecretReference,
}

/// Namespace primitives on the distributed filesystem
#[async_trait]
pub trait BackingStoreGateway: Send + Sync {
    /// Create the namespace at `path`
    ///
    /// Returns [`GatewayError::AlreadyExists`] when the path is already present.
    async fn create_namespace(&self, path: &str) -> Result<(), GatewayError>;

    /// Remove the namespace at `path`
    ///
    /// With `recursive` set, the namespace and everything below it is removed.
    /// Returns [`GatewayError::NotFound`] when the path is absent.
    async fn remove_namespace(&self, path: &str, recursive: bool) -> Result<(), GatewayError>;

    /// Check that the backing filesystem is reachable and writable
    async fn health_check(&self) -> Result<(), GatewayError>;

    /// Connection details used to address the cluster
    fn connection(&self) -> &CephConnection;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Namespace not found: {0}")]
    NotFound(String),

    #[error("Namespace already exists: {0}")]
    AlreadyExists(String),

    #[error("Namespace not empty: {0}")]
    NotEmpty(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => GatewayError::PermissionDenied(err.to_string()),
            _ => GatewayError::Io(err.to_string()),
        }
    }
}

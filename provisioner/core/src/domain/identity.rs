// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioner Identity
//!
//! Every provisioner process generates one [`ProvisionerIdentity`] at start-up
//! and stamps it on each volume it creates. On reclamation the stamp is
//! compared against the running identity so that one instance never deletes
//! storage created by another instance (for example the previous generation
//! still draining during a rolling restart).
//!
//! The identity is an ownership tag only. It is not a credential and must not
//! be used for access control.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Annotation key carrying the identity of the provisioner that created a volume.
///
/// The same key is used when writing the annotation on provision and when
/// reading it back on delete.
pub const IDENTITY_ANNOTATION: &str = "cephFSProvisionerIdentity";

/// Opaque, process-unique ownership token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisionerIdentity(String);

impl ProvisionerIdentity {
    /// Generate a fresh random identity (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing token, e.g. when rebuilding a fixture in tests
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `annotation` was written by this identity
    pub fn owns(&self, annotation: &str) -> bool {
        self.0 == annotation
    }
}

impl std::fmt::Display for ProvisionerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

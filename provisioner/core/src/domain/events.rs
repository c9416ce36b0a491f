// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Volume lifecycle events published by the provisioner and controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VolumeEvent {
    VolumeProvisioned {
        volume: String,
        claim: String,
        path: String,
        capacity: Option<String>,
        provisioned_at: DateTime<Utc>,
    },
    ProvisionFailed {
        volume: String,
        claim: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    VolumeDeleted {
        volume: String,
        path: String,
        deleted_at: DateTime<Utc>,
    },
    DeleteIgnored {
        volume: String,
        owner: String,
        ignored_at: DateTime<Utc>,
    },
    DeleteFailed {
        volume: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    /// Retry threshold exceeded; the controller no longer acts on the resource
    ResourceAbandoned {
        resource: String,
        failures: u32,
        abandoned_at: DateTime<Utc>,
    },
}

impl VolumeEvent {
    /// Volume or claim key the event refers to
    pub fn subject(&self) -> &str {
        match self {
            Self::VolumeProvisioned { volume, .. }
            | Self::ProvisionFailed { volume, .. }
            | Self::VolumeDeleted { volume, .. }
            | Self::DeleteIgnored { volume, .. }
            | Self::DeleteFailed { volume, .. } => volume,
            Self::ResourceAbandoned { resource, .. } => resource,
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backing Store Gateway Infrastructure
//!
//! Concrete implementations of the BackingStoreGateway trait.

pub mod memory;
pub mod mounted;

pub use memory::InMemoryGateway;
pub use mounted::MountedCephFsGateway;

use std::sync::Arc;

use crate::domain::gateway::{BackingStoreGateway, CephConnection};
use crate::domain::provisioner_config::GatewayConfig;

/// Build the gateway selected in configuration
pub fn create_gateway(config: &GatewayConfig, connection: CephConnection) -> Arc<dyn BackingStoreGateway> {
    match config {
        GatewayConfig::Mounted { mount_root } => {
            Arc::new(MountedCephFsGateway::new(mount_root.clone(), connection))
        }
        GatewayConfig::Memory => Arc::new(InMemoryGateway::new(connection)),
    }
}

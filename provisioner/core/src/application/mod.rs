// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod allocator;
pub mod reclaimer;
pub mod cephfs_provisioner;
pub mod controller;

pub use allocator::VolumeAllocator;
pub use reclaimer::{Reclaimed, VolumeReclaimer};
pub use cephfs_provisioner::CephFsProvisioner;
pub use controller::{ControllerError, ProvisionController, SyncOutcome};

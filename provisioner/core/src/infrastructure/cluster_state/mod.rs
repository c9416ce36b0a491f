// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cluster state stores backing the reconciliation controller.

pub mod file;
pub mod memory;

pub use file::FileClusterState;
pub use memory::InMemoryClusterState;

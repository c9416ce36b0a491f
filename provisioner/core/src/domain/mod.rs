// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain types and contracts for the CephFS provisioner.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Volume model, ownership identity, gateway and cluster-state contracts

pub mod identity;
pub mod volume;
pub mod gateway;
pub mod provisioner;
pub mod cluster;
pub mod events;
pub mod provisioner_config;

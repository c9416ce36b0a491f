// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! CephFS volume provisioner core
//!
//! Allocates CephFS namespaces for storage claims and reclaims them on
//! release, restricted to volumes stamped with the running instance's
//! identity.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, application services and infrastructure adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::identity::{ProvisionerIdentity, IDENTITY_ANNOTATION};
pub use domain::provisioner::{ProvisionError, Provisioner};

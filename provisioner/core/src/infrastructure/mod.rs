// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cluster_state;
pub mod event_bus;
pub mod gateway;

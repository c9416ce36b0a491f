// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `run` - reconciliation controller
//!
//! Wires configuration, gateway, cluster state and provisioner together and
//! resyncs until Ctrl-C or SIGTERM.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cephfs_provisioner_core::application::{CephFsProvisioner, ProvisionController};
use cephfs_provisioner_core::domain::identity::ProvisionerIdentity;
use cephfs_provisioner_core::domain::provisioner_config::ProvisionerConfigManifest;
use cephfs_provisioner_core::infrastructure::cluster_state::FileClusterState;
use cephfs_provisioner_core::infrastructure::event_bus::{EventBus, EventBusError};
use cephfs_provisioner_core::infrastructure::gateway::create_gateway;

pub async fn handle_command(config_override: Option<PathBuf>) -> Result<()> {
    let config = ProvisionerConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    let spec = &config.spec;

    let gateway = create_gateway(&spec.gateway, spec.ceph.connection());
    gateway
        .health_check()
        .await
        .context("Backing store is not usable")?;

    let state = FileClusterState::open(&spec.state.dir)
        .await
        .with_context(|| format!("Failed to open state directory {:?}", spec.state.dir))?;

    let identity = ProvisionerIdentity::generate();
    let event_bus = Arc::new(EventBus::with_default_capacity());
    spawn_event_logger(&event_bus);

    let provisioner = Arc::new(CephFsProvisioner::new(
        identity.clone(),
        gateway,
        spec.ceph.root_path.clone(),
        event_bus.clone(),
    ));
    let controller = ProvisionController::new(
        spec.provisioner.clone(),
        provisioner,
        Arc::new(state),
        event_bus,
    );

    info!(
        identity = %identity,
        provisioner = %spec.provisioner.name,
        root_path = %spec.ceph.root_path,
        "CephFS provisioner started"
    );

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    controller.run(shutdown).await;
    info!("CephFS provisioner stopped");
    Ok(())
}

fn spawn_event_logger(event_bus: &EventBus) {
    let mut receiver = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!(event = %json, "Volume event"),
                    Err(e) => warn!("Failed to serialize volume event: {}", e),
                },
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

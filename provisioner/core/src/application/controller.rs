// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provision Controller - reconciliation loop driving a [`Provisioner`]
//!
//! Each pass walks the cluster state:
//! - unbound claims naming this provisioner get a volume
//! - `Delete`-policy volumes whose claim is gone are reclaimed
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Turns cluster state into provision/delete calls with
//!   per-resource serialisation, retry accounting and optional backoff

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::cluster::{ClusterState, ClusterStateError, StorageClaim};
use crate::domain::events::VolumeEvent;
use crate::domain::provisioner::{ProvisionError, Provisioner};
use crate::domain::provisioner_config::ControllerConfig;
use crate::domain::volume::{
    ReclaimPolicy, VolumeDescriptor, VolumePhase, VolumeRequest, PROVISIONED_BY_ANNOTATION,
};
use crate::infrastructure::event_bus::EventBus;

const MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Cluster state error: {0}")]
    State(#[from] ClusterStateError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// What a single sync call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A volume was created and bound to the claim
    Provisioned(String),
    /// An existing volume was bound to its claim without provisioning
    Adopted(String),
    /// The volume's namespace was reclaimed and the volume forgotten
    Deleted(String),
    /// Nothing to do for this resource
    Skipped,
    /// The volume belongs to another provisioner instance
    Ignored,
    /// Another operation on the same resource is running
    InFlight,
    /// A previous failure delays the next attempt
    BackingOff,
    /// The retry threshold was reached earlier, or the last error could not
    /// be fixed by retrying
    Abandoned,
}

#[derive(Debug, Clone, Copy)]
struct FailureRecord {
    count: u32,
    next_attempt: Instant,
    abandoned: bool,
}

/// Releases the in-flight slot of a resource on drop
struct InFlightGuard<'a> {
    in_flight: &'a DashSet<String>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

pub struct ProvisionController {
    config: ControllerConfig,
    provisioner: Arc<dyn Provisioner>,
    state: Arc<dyn ClusterState>,
    event_bus: Arc<EventBus>,
    in_flight: DashSet<String>,
    failures: DashMap<String, FailureRecord>,
}

impl ProvisionController {
    pub fn new(
        config: ControllerConfig,
        provisioner: Arc<dyn Provisioner>,
        state: Arc<dyn ClusterState>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            provisioner,
            state,
            event_bus,
            in_flight: DashSet::new(),
            failures: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Consecutive failures recorded for a resource key
    /// (`claim/<namespace>/<name>` or `volume/<name>`)
    pub fn failure_count(&self, key: &str) -> u32 {
        self.failures.get(key).map(|r| r.count).unwrap_or(0)
    }

    /// Provision a volume for `claim` if it needs one
    pub async fn sync_claim(&self, claim: &StorageClaim) -> Result<SyncOutcome, ControllerError> {
        if claim.provisioner != self.config.name || claim.is_bound() {
            return Ok(SyncOutcome::Skipped);
        }

        let key = format!("claim/{}", claim.key());
        let Some(_guard) = self.try_begin(&key) else {
            return Ok(SyncOutcome::InFlight);
        };
        if let Some(outcome) = self.check_retry(&key) {
            return Ok(outcome);
        }

        let volume_name = claim.volume_name_for();
        if self.state.get_volume(&volume_name).await?.is_some() {
            // Persisted on an earlier pass that failed before binding
            self.state.bind_claim(&claim.key(), &volume_name).await?;
            info!("Bound claim {} to existing volume {}", claim.key(), volume_name);
            return Ok(SyncOutcome::Adopted(volume_name));
        }

        let request = VolumeRequest {
            pv_name: volume_name,
            reclaim_policy: claim.reclaim_policy,
            access_modes: claim.access_modes.clone(),
            capacity: claim.requests.clone(),
            claim_ref: claim.reference(),
        };

        let mut volume = match self.provisioner.provision(&request).await {
            Ok(volume) => volume,
            Err(e) => {
                self.record_failure(&key, e.is_retryable());
                return Err(e.into());
            }
        };

        volume
            .annotations
            .insert(PROVISIONED_BY_ANNOTATION.to_string(), self.config.name.clone());
        volume.claim_ref = Some(request.claim_ref.clone());
        volume.phase = VolumePhase::Bound;

        self.state.save_volume(&volume).await?;
        self.state.bind_claim(&claim.key(), &volume.name).await?;
        self.failures.remove(&key);

        info!("Claim {} bound to volume {}", claim.key(), volume.name);
        Ok(SyncOutcome::Provisioned(volume.name))
    }

    /// Reclaim `volume` if its claim is gone and its policy says so
    pub async fn sync_volume(&self, volume: &VolumeDescriptor) -> Result<SyncOutcome, ControllerError> {
        let claims = self.claim_uids().await?;
        self.sync_volume_with(volume, &claims).await
    }

    async fn sync_volume_with(
        &self,
        volume: &VolumeDescriptor,
        claims: &HashSet<(String, String)>,
    ) -> Result<SyncOutcome, ControllerError> {
        if volume.annotation(PROVISIONED_BY_ANNOTATION) != Some(self.config.name.as_str())
            || volume.reclaim_policy != ReclaimPolicy::Delete
            || volume.phase == VolumePhase::Failed
        {
            return Ok(SyncOutcome::Skipped);
        }

        let claim_present = volume
            .claim_ref
            .as_ref()
            .map(|r| claims.contains(&(r.key(), r.uid.clone())))
            .unwrap_or(false);
        if claim_present {
            return Ok(SyncOutcome::Skipped);
        }

        let key = format!("volume/{}", volume.name);
        let Some(_guard) = self.try_begin(&key) else {
            return Ok(SyncOutcome::InFlight);
        };
        if let Some(outcome) = self.check_retry(&key) {
            return Ok(outcome);
        }

        let mut volume = volume.clone();
        if volume.phase != VolumePhase::Released {
            volume.phase = VolumePhase::Released;
            self.state.save_volume(&volume).await?;
            debug!("Volume {} released", volume.name);
        }

        match self.provisioner.delete(&volume).await {
            Ok(()) => {
                self.state.delete_volume(&volume.name).await?;
                self.failures.remove(&key);
                info!("Volume {} reclaimed", volume.name);
                Ok(SyncOutcome::Deleted(volume.name))
            }
            Err(e) if e.is_ignored() => {
                debug!("Volume {} left to its owner", volume.name);
                Ok(SyncOutcome::Ignored)
            }
            Err(e) => {
                if self.record_failure(&key, e.is_retryable()) {
                    volume.phase = VolumePhase::Failed;
                    self.state.save_volume(&volume).await?;
                }
                Err(e.into())
            }
        }
    }

    /// One reconciliation pass over every claim and volume
    pub async fn resync(&self) -> Result<(), ControllerError> {
        for claim in self.state.list_claims().await? {
            if let Err(e) = self.sync_claim(&claim).await {
                warn!("Failed to sync claim {}: {}", claim.key(), e);
            }
        }

        let claims = self.claim_uids().await?;
        for volume in self.state.list_volumes().await? {
            if let Err(e) = self.sync_volume_with(&volume, &claims).await {
                warn!("Failed to sync volume {}: {}", volume.name, e);
            }
        }

        self.prune_failures().await
    }

    /// Forget failure records of resources no longer in cluster state
    async fn prune_failures(&self) -> Result<(), ControllerError> {
        let mut live: HashSet<String> = self
            .state
            .list_claims()
            .await?
            .iter()
            .map(|c| format!("claim/{}", c.key()))
            .collect();
        live.extend(
            self.state
                .list_volumes()
                .await?
                .iter()
                .map(|v| format!("volume/{}", v.name)),
        );

        self.failures.retain(|key, _| {
            let keep = live.contains(key);
            if !keep {
                debug!("Dropping failure record of {}", key);
            }
            keep
        });
        Ok(())
    }

    /// Resync every `resync_period` until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            provisioner = %self.config.name,
            resync_period = ?self.config.resync_period,
            "Starting provision controller"
        );

        let mut tick = interval(self.config.resync_period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.resync().await {
                        warn!("Resync failed: {}", e);
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping provision controller");
                    break;
                }
            }
        }
    }

    async fn claim_uids(&self) -> Result<HashSet<(String, String)>, ControllerError> {
        Ok(self
            .state
            .list_claims()
            .await?
            .into_iter()
            .map(|c| (c.key(), c.uid))
            .collect())
    }

    fn try_begin(&self, key: &str) -> Option<InFlightGuard<'_>> {
        if !self.in_flight.insert(key.to_string()) {
            debug!("Operation on {} already in flight", key);
            return None;
        }
        Some(InFlightGuard {
            in_flight: &self.in_flight,
            key: key.to_string(),
        })
    }

    fn check_retry(&self, key: &str) -> Option<SyncOutcome> {
        let record = *self.failures.get(key)?;
        if record.abandoned {
            return Some(SyncOutcome::Abandoned);
        }
        if Instant::now() < record.next_attempt {
            return Some(SyncOutcome::BackingOff);
        }
        None
    }

    /// Returns true when the resource has just been abandoned
    ///
    /// A non-retryable failure abandons the resource at once.
    fn record_failure(&self, key: &str, retryable: bool) -> bool {
        let count = {
            let mut record = self.failures.entry(key.to_string()).or_insert(FailureRecord {
                count: 0,
                next_attempt: Instant::now(),
                abandoned: false,
            });
            record.count += 1;
            record.next_attempt = Instant::now() + self.backoff(record.count);
            record.abandoned = !retryable || record.count >= self.config.failed_retry_threshold;
            if !record.abandoned {
                warn!(
                    "Operation on {} failed ({} consecutive failures)",
                    key, record.count
                );
                return false;
            }
            record.count
        };

        if retryable {
            error!("Giving up on {} after {} consecutive failures", key, count);
        } else {
            error!("Giving up on {}: failure is not retryable", key);
        }
        self.event_bus.publish_volume_event(VolumeEvent::ResourceAbandoned {
            resource: key.to_string(),
            failures: count,
            abandoned_at: Utc::now(),
        });
        true
    }

    fn backoff(&self, failures: u32) -> Duration {
        if !self.config.exponential_backoff_on_error {
            return Duration::ZERO;
        }
        let exponent = failures.saturating_sub(1).min(16);
        self.config
            .resync_period
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cephfs_provisioner::CephFsProvisioner;
    use crate::domain::gateway::{BackingStoreGateway, CephConnection, GatewayError};
    use crate::domain::identity::{ProvisionerIdentity, IDENTITY_ANNOTATION};
    use async_trait::async_trait;
    use tokio::sync::Notify;
    use crate::domain::volume::{AccessMode, Quantity, ResourceList, SecretReference, STORAGE_RESOURCE};
    use crate::infrastructure::cluster_state::InMemoryClusterState;
    use crate::infrastructure::gateway::InMemoryGateway;

    struct Fixture {
        controller: ProvisionController,
        gateway: Arc<InMemoryGateway>,
        state: Arc<InMemoryClusterState>,
        event_bus: Arc<EventBus>,
    }

    fn fixture(config: ControllerConfig) -> Fixture {
        let gateway = Arc::new(InMemoryGateway::new(CephConnection {
            monitors: vec!["10.0.0.1:6789".to_string()],
            admin: "admin".to_string(),
            secret_ref: SecretReference {
                name: "ceph-secret-admin".to_string(),
                namespace: None,
            },
        }));
        let state = Arc::new(InMemoryClusterState::new());
        let event_bus = Arc::new(EventBus::new(64));
        let provisioner = Arc::new(CephFsProvisioner::new(
            ProvisionerIdentity::generate(),
            gateway.clone(),
            "/volumes/kubernetes",
            event_bus.clone(),
        ));
        Fixture {
            controller: ProvisionController::new(config, provisioner, state.clone(), event_bus.clone()),
            gateway,
            state,
            event_bus,
        }
    }

    fn claim(name: &str, uid: &str) -> StorageClaim {
        StorageClaim {
            namespace: "default".to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
            provisioner: "kubernetes.io/cephfs".to_string(),
            access_modes: vec![AccessMode::ReadWriteMany],
            requests: ResourceList::from([(
                STORAGE_RESOURCE.to_string(),
                Quantity::parse("5Gi").unwrap(),
            )]),
            reclaim_policy: ReclaimPolicy::Delete,
            volume_name: None,
        }
    }

    #[tokio::test]
    async fn test_sync_claim_provisions_and_binds() {
        let f = fixture(ControllerConfig::default());
        let claim = claim("data", "abc123");
        f.state.add_claim(claim.clone());

        let outcome = f.controller.sync_claim(&claim).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Provisioned("pvc-abc123".to_string()));

        let volume = f.state.volume("pvc-abc123").unwrap();
        assert_eq!(volume.phase, VolumePhase::Bound);
        assert_eq!(
            volume.annotation(PROVISIONED_BY_ANNOTATION),
            Some("kubernetes.io/cephfs")
        );
        assert_eq!(volume.claim_ref.as_ref().unwrap().uid, "abc123");
        assert_eq!(
            f.state.claim("default/data").unwrap().volume_name.as_deref(),
            Some("pvc-abc123")
        );
        assert!(f.gateway.contains("/volumes/kubernetes/pvc-abc123"));

        let bound = f.state.claim("default/data").unwrap();
        assert_eq!(f.controller.sync_claim(&bound).await.unwrap(), SyncOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_foreign_provisioner_claims_are_skipped() {
        let f = fixture(ControllerConfig::default());
        let mut claim = claim("data", "abc123");
        claim.provisioner = "example.com/nfs".to_string();
        f.state.add_claim(claim.clone());

        assert_eq!(f.controller.sync_claim(&claim).await.unwrap(), SyncOutcome::Skipped);
        assert_eq!(f.gateway.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_resync_reclaims_released_volume() {
        let f = fixture(ControllerConfig::default());
        f.state.add_claim(claim("data", "abc123"));
        f.controller.resync().await.unwrap();
        assert!(f.gateway.contains("/volumes/kubernetes/pvc-abc123"));

        f.state.remove_claim("default/data");
        f.controller.resync().await.unwrap();

        assert!(f.state.volume("pvc-abc123").is_none());
        assert!(!f.gateway.contains("/volumes/kubernetes/pvc-abc123"));
    }

    #[tokio::test]
    async fn test_retain_policy_keeps_namespace() {
        let f = fixture(ControllerConfig::default());
        let mut retained = claim("data", "abc123");
        retained.reclaim_policy = ReclaimPolicy::Retain;
        f.state.add_claim(retained);
        f.controller.resync().await.unwrap();

        f.state.remove_claim("default/data");
        f.controller.resync().await.unwrap();

        assert!(f.state.volume("pvc-abc123").is_some());
        assert!(f.gateway.contains("/volumes/kubernetes/pvc-abc123"));
        assert_eq!(f.gateway.remove_calls(), 0);
    }

    #[tokio::test]
    async fn test_volume_of_another_instance_is_ignored() {
        let f = fixture(ControllerConfig::default());
        f.state.add_claim(claim("data", "abc123"));
        f.controller.resync().await.unwrap();

        // Same provisioner name, different process identity
        let restarted = ProvisionController::new(
            ControllerConfig::default(),
            Arc::new(CephFsProvisioner::new(
                ProvisionerIdentity::generate(),
                f.gateway.clone(),
                "/volumes/kubernetes",
                f.event_bus.clone(),
            )),
            f.state.clone(),
            f.event_bus.clone(),
        );

        f.state.remove_claim("default/data");
        let volume = f.state.volume("pvc-abc123").unwrap();
        assert_eq!(restarted.sync_volume(&volume).await.unwrap(), SyncOutcome::Ignored);
        assert_eq!(restarted.failure_count("volume/pvc-abc123"), 0);
        assert_eq!(f.gateway.remove_calls(), 0);
        assert_eq!(f.state.volume("pvc-abc123").unwrap().phase, VolumePhase::Released);
    }

    #[tokio::test]
    async fn test_repeated_failures_abandon_volume() {
        let config = ControllerConfig {
            failed_retry_threshold: 2,
            ..ControllerConfig::default()
        };
        let f = fixture(config);
        let mut receiver = f.event_bus.subscribe_subject("volume/pvc-abc123");
        f.state.add_claim(claim("data", "abc123"));
        f.controller.resync().await.unwrap();
        f.state.remove_claim("default/data");
        let volume = f.state.volume("pvc-abc123").unwrap();

        f.gateway.fail_next_removes(10);
        assert!(f.controller.sync_volume(&volume).await.is_err());
        assert_eq!(f.controller.failure_count("volume/pvc-abc123"), 1);
        assert!(f.controller.sync_volume(&volume).await.is_err());

        match receiver.recv().await.unwrap() {
            VolumeEvent::ResourceAbandoned { failures, .. } => assert_eq!(failures, 2),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(
            f.controller.sync_volume(&volume).await.unwrap(),
            SyncOutcome::Abandoned
        );
        assert_eq!(f.state.volume("pvc-abc123").unwrap().phase, VolumePhase::Failed);
        assert_eq!(f.gateway.remove_calls(), 2);
    }

    #[tokio::test]
    async fn test_backoff_delays_retry() {
        let config = ControllerConfig {
            exponential_backoff_on_error: true,
            resync_period: Duration::from_secs(60),
            ..ControllerConfig::default()
        };
        let f = fixture(config);
        let claim = claim("data", "abc123");
        f.state.add_claim(claim.clone());

        f.gateway.fail_next_creates(1);
        assert!(f.controller.sync_claim(&claim).await.is_err());
        assert_eq!(
            f.controller.sync_claim(&claim).await.unwrap(),
            SyncOutcome::BackingOff
        );
        assert_eq!(f.gateway.create_calls(), 1);
    }

    #[test]
    fn test_backoff_schedule() {
        let config = ControllerConfig {
            exponential_backoff_on_error: true,
            resync_period: Duration::from_secs(15),
            ..ControllerConfig::default()
        };
        let f = fixture(config);
        assert_eq!(f.controller.backoff(1), Duration::from_secs(15));
        assert_eq!(f.controller.backoff(3), Duration::from_secs(60));
        assert_eq!(f.controller.backoff(10), MAX_BACKOFF);

        let f = fixture(ControllerConfig::default());
        assert_eq!(f.controller.backoff(4), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = fixture(ControllerConfig {
            resync_period: Duration::from_millis(10),
            ..ControllerConfig::default()
        });
        f.state.add_claim(claim("data", "abc123"));
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
        f.controller.run(shutdown).await;
        stopper.await.unwrap();

        assert!(f.state.volume("pvc-abc123").is_some());
        assert!(f.gateway.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_identity_is_abandoned_without_retry() {
        let f = fixture(ControllerConfig::default());
        let mut receiver = f.event_bus.subscribe_subject("volume/pvc-abc123");
        f.state.add_claim(claim("data", "abc123"));
        f.controller.resync().await.unwrap();
        f.state.remove_claim("default/data");

        let mut volume = f.state.volume("pvc-abc123").unwrap();
        volume.annotations.remove(IDENTITY_ANNOTATION);
        f.state.save_volume(&volume).await.unwrap();

        let err = f.controller.sync_volume(&volume).await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Provision(ProvisionError::MissingIdentity(_))
        ));
        assert_eq!(f.controller.failure_count("volume/pvc-abc123"), 1);
        assert!(matches!(
            receiver.recv().await.unwrap(),
            VolumeEvent::ResourceAbandoned { failures: 1, .. }
        ));

        assert_eq!(
            f.controller.sync_volume(&volume).await.unwrap(),
            SyncOutcome::Abandoned
        );
        assert_eq!(f.controller.failure_count("volume/pvc-abc123"), 1);
        assert_eq!(f.state.volume("pvc-abc123").unwrap().phase, VolumePhase::Failed);
        assert_eq!(f.gateway.remove_calls(), 0);
        assert!(f.gateway.contains("/volumes/kubernetes/pvc-abc123"));
    }

    #[tokio::test]
    async fn test_invalid_claim_is_abandoned_without_retry() {
        let f = fixture(ControllerConfig::default());
        let mut invalid = claim("data", "abc123");
        invalid.requests.clear();
        f.state.add_claim(invalid.clone());

        assert!(f.controller.sync_claim(&invalid).await.is_err());
        assert_eq!(
            f.controller.sync_claim(&invalid).await.unwrap(),
            SyncOutcome::Abandoned
        );
        assert_eq!(f.controller.failure_count("claim/default/data"), 1);
        assert_eq!(f.gateway.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_persisted_volume_is_adopted_without_create() {
        let f = fixture(ControllerConfig::default());
        let claim = claim("data", "abc123");
        f.state.add_claim(claim.clone());

        let other = fixture(ControllerConfig::default());
        other.state.add_claim(claim.clone());
        other.controller.sync_claim(&claim).await.unwrap();
        f.state
            .save_volume(&other.state.volume("pvc-abc123").unwrap())
            .await
            .unwrap();

        assert_eq!(
            f.controller.sync_claim(&claim).await.unwrap(),
            SyncOutcome::Adopted("pvc-abc123".to_string())
        );
        assert_eq!(f.gateway.create_calls(), 0);
    }

    /// Gateway whose create call parks until released
    struct ParkingGateway {
        inner: InMemoryGateway,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl BackingStoreGateway for ParkingGateway {
        async fn create_namespace(&self, path: &str) -> Result<(), GatewayError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.create_namespace(path).await
        }

        async fn remove_namespace(&self, path: &str, recursive: bool) -> Result<(), GatewayError> {
            self.inner.remove_namespace(path, recursive).await
        }

        async fn health_check(&self) -> Result<(), GatewayError> {
            self.inner.health_check().await
        }

        fn connection(&self) -> &CephConnection {
            self.inner.connection()
        }
    }

    #[tokio::test]
    async fn test_concurrent_sync_of_same_claim_is_in_flight() {
        let gateway = Arc::new(ParkingGateway {
            inner: InMemoryGateway::new(CephConnection {
                monitors: vec!["10.0.0.1:6789".to_string()],
                admin: "admin".to_string(),
                secret_ref: SecretReference {
                    name: "ceph-secret-admin".to_string(),
                    namespace: None,
                },
            }),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let state = Arc::new(InMemoryClusterState::new());
        let event_bus = Arc::new(EventBus::new(16));
        let controller = ProvisionController::new(
            ControllerConfig::default(),
            Arc::new(CephFsProvisioner::new(
                ProvisionerIdentity::generate(),
                gateway.clone(),
                "/volumes/kubernetes",
                event_bus.clone(),
            )),
            state.clone(),
            event_bus,
        );
        let claim = claim("data", "abc123");
        state.add_claim(claim.clone());

        let first = controller.sync_claim(&claim);
        let second = async {
            gateway.entered.notified().await;
            let outcome = controller.sync_claim(&claim).await;
            gateway.release.notify_one();
            outcome
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap(), SyncOutcome::Provisioned("pvc-abc123".to_string()));
        assert_eq!(second.unwrap(), SyncOutcome::InFlight);
        assert_eq!(gateway.inner.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_resync_drops_failures_of_removed_resources() {
        let f = fixture(ControllerConfig::default());
        f.state.add_claim(claim("data", "abc123"));
        f.gateway.fail_next_creates(1);

        f.controller.resync().await.unwrap();
        assert_eq!(f.controller.failure_count("claim/default/data"), 1);

        f.state.remove_claim("default/data");
        f.controller.resync().await.unwrap();
        assert_eq!(f.controller.failure_count("claim/default/data"), 0);
    }
}

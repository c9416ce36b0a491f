// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory gateway for tests and dry runs.
//!
//! Namespaces are tracked as a set of paths. Every call is counted so tests
//! can assert that the ownership check short-circuits before any storage
//! access, and failures can be injected per operation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::gateway::{BackingStoreGateway, CephConnection, GatewayError};

#[derive(Debug, Default)]
struct Faults {
    create: usize,
    remove: usize,
}

pub struct InMemoryGateway {
    connection: CephConnection,
    namespaces: Mutex<BTreeSet<String>>,
    faults: Mutex<Faults>,
    create_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl InMemoryGateway {
    pub fn new(connection: CephConnection) -> Self {
        Self {
            connection,
            namespaces: Mutex::new(BTreeSet::new()),
            faults: Mutex::new(Faults::default()),
            create_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
        }
    }

    fn normalize(path: &str) -> String {
        path.trim_end_matches('/').to_string()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.namespaces.lock().contains(&Self::normalize(path))
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.lock().iter().cloned().collect()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    /// Make the next `count` create calls fail with [`GatewayError::Unavailable`]
    pub fn fail_next_creates(&self, count: usize) {
        self.faults.lock().create = count;
    }

    /// Make the next `count` remove calls fail with [`GatewayError::Unavailable`]
    pub fn fail_next_removes(&self, count: usize) {
        self.faults.lock().remove = count;
    }

    fn take_fault(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl BackingStoreGateway for InMemoryGateway {
    async fn create_namespace(&self, path: &str) -> Result<(), GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_fault(&mut self.faults.lock().create) {
            return Err(GatewayError::Unavailable("injected create failure".to_string()));
        }

        let path = Self::normalize(path);
        if path.is_empty() {
            return Err(GatewayError::InvalidPath("empty path".to_string()));
        }

        let mut namespaces = self.namespaces.lock();
        if !namespaces.insert(path.clone()) {
            return Err(GatewayError::AlreadyExists(path));
        }
        Ok(())
    }

    async fn remove_namespace(&self, path: &str, recursive: bool) -> Result<(), GatewayError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_fault(&mut self.faults.lock().remove) {
            return Err(GatewayError::Unavailable("injected remove failure".to_string()));
        }

        let path = Self::normalize(path);
        let prefix = format!("{path}/");
        let mut namespaces = self.namespaces.lock();
        if !namespaces.contains(&path) {
            return Err(GatewayError::NotFound(path));
        }

        let has_children = namespaces.iter().any(|ns| ns.starts_with(&prefix));
        if has_children && !recursive {
            return Err(GatewayError::NotEmpty(path));
        }

        namespaces.retain(|ns| ns != &path && !ns.starts_with(&prefix));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    fn connection(&self) -> &CephConnection {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::volume::SecretReference;

    fn gateway() -> InMemoryGateway {
        InMemoryGateway::new(CephConnection {
            monitors: vec!["10.0.0.1:6789".to_string()],
            admin: "admin".to_string(),
            secret_ref: SecretReference {
                name: "ceph-secret-admin".to_string(),
                namespace: None,
            },
        })
    }

    #[tokio::test]
    async fn test_create_remove_and_counters() {
        let gateway = gateway();

        gateway.create_namespace("root/pvc-1").await.unwrap();
        assert!(gateway.contains("root/pvc-1"));
        assert!(matches!(
            gateway.create_namespace("root/pvc-1").await,
            Err(GatewayError::AlreadyExists(_))
        ));

        gateway.remove_namespace("root/pvc-1", true).await.unwrap();
        assert!(!gateway.contains("root/pvc-1"));
        assert!(matches!(
            gateway.remove_namespace("root/pvc-1", true).await,
            Err(GatewayError::NotFound(_))
        ));

        assert_eq!(gateway.create_calls(), 2);
        assert_eq!(gateway.remove_calls(), 2);
    }

    #[tokio::test]
    async fn test_recursive_removal_drops_children() {
        let gateway = gateway();
        gateway.create_namespace("root/pvc-1").await.unwrap();
        gateway.create_namespace("root/pvc-1/snap").await.unwrap();
        gateway.create_namespace("root/pvc-10").await.unwrap();

        assert!(matches!(
            gateway.remove_namespace("root/pvc-1", false).await,
            Err(GatewayError::NotEmpty(_))
        ));

        gateway.remove_namespace("root/pvc-1", true).await.unwrap();
        assert_eq!(gateway.namespaces(), vec!["root/pvc-10".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_faults_are_consumed() {
        let gateway = gateway();
        gateway.fail_next_creates(1);

        assert!(matches!(
            gateway.create_namespace("root/pvc-1").await,
            Err(GatewayError::Unavailable(_))
        ));
        assert!(!gateway.contains("root/pvc-1"));
        gateway.create_namespace("root/pvc-1").await.unwrap();
    }
}

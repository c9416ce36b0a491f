// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Provisioner Configuration Types
//
// Defines the configuration schema for a CephFS provisioner process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Controller registration (provisioner name, resync, retry policy)
// - Ceph cluster addressing (monitors, admin principal, secret reference)
// - Backing store gateway selection
// - Cluster state location

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::gateway::CephConnection;
use crate::domain::volume::SecretReference;

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "ProvisionerConfig";

/// Environment variable pointing at an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "CEPHFS_PROVISIONER_CONFIG";

/// Top-level Kubernetes-style provisioner configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ProvisionerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ProvisionerConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerConfigSpec {
    #[serde(default)]
    pub provisioner: ControllerConfig,

    #[serde(default)]
    pub ceph: CephConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub state: StateConfig,
}

/// Registration with the reconciliation controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Name claims select this provisioner by
    #[serde(default = "default_provisioner_name")]
    pub name: String,

    /// Interval between full reconciliation passes
    #[serde(default = "default_resync_period", with = "humantime_serde")]
    pub resync_period: Duration,

    /// Delay retries of failing resources exponentially
    #[serde(default)]
    pub exponential_backoff_on_error: bool,

    /// Consecutive failures after which a resource is abandoned
    #[serde(default = "default_failed_retry_threshold")]
    pub failed_retry_threshold: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: default_provisioner_name(),
            resync_period: default_resync_period(),
            exponential_backoff_on_error: false,
            failed_retry_threshold: default_failed_retry_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CephConfig {
    /// Ceph monitor endpoints (`host:port`)
    #[serde(default = "default_monitors")]
    pub monitors: Vec<String>,

    /// Rados admin principal
    #[serde(default = "default_admin")]
    pub admin: String,

    /// Secret holding the admin key
    #[serde(default = "default_secret_ref")]
    pub secret_ref: SecretReference,

    /// Directory under the CephFS root that holds provisioned volumes
    #[serde(default = "default_root_path")]
    pub root_path: String,
}

impl Default for CephConfig {
    fn default() -> Self {
        Self {
            monitors: default_monitors(),
            admin: default_admin(),
            secret_ref: default_secret_ref(),
            root_path: default_root_path(),
        }
    }
}

impl CephConfig {
    pub fn connection(&self) -> CephConnection {
        CephConnection {
            monitors: self.monitors.clone(),
            admin: self.admin.clone(),
            secret_ref: self.secret_ref.clone(),
        }
    }
}

/// Backing store gateway selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GatewayConfig {
    /// CephFS mounted locally at `mount_root`
    Mounted { mount_root: PathBuf },
    /// In-process namespaces (development/testing)
    Memory,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::Mounted {
            mount_root: PathBuf::from("/mnt/cephfs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding `claims/` and `volumes/`
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
        }
    }
}

impl Default for ProvisionerConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "cephfs-provisioner".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ProvisionerConfigSpec::default(),
        }
    }
}

impl ProvisionerConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CEPHFS_PROVISIONER_CONFIG environment variable
    /// 2. ./cephfs-provisioner.yaml (working directory)
    /// 3. ~/.cephfs-provisioner/config.yaml (user home)
    /// 4. /etc/cephfs-provisioner/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./cephfs-provisioner.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cephfs-provisioner").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/cephfs-provisioner/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let ceph = &mut self.spec.ceph;

        if let Some(val) = lookup("CEPHFS_MONITORS") {
            let monitors: Vec<String> = val
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            if monitors.is_empty() {
                tracing::warn!("Ignoring empty CEPHFS_MONITORS override");
            } else {
                tracing::info!("Environment override: CEPHFS_MONITORS ({} monitors)", monitors.len());
                ceph.monitors = monitors;
            }
        }

        if let Some(val) = lookup("CEPHFS_ADMIN_ID") {
            tracing::info!("Environment override: CEPHFS_ADMIN_ID={}", val);
            ceph.admin = val;
        }

        if let Some(val) = lookup("CEPHFS_SECRET_NAME") {
            tracing::info!("Environment override: CEPHFS_SECRET_NAME={}", val);
            ceph.secret_ref.name = val;
        }

        if let Some(val) = lookup("CEPHFS_SECRET_NAMESPACE") {
            tracing::info!("Environment override: CEPHFS_SECRET_NAMESPACE={}", val);
            ceph.secret_ref.namespace = Some(val);
        }

        if let Some(val) = lookup("CEPHFS_ROOT_PATH") {
            tracing::info!("Environment override: CEPHFS_ROOT_PATH={}", val);
            ceph.root_path = val;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let provisioner = &self.spec.provisioner;
        if provisioner.name.trim().is_empty() {
            anyhow::bail!("spec.provisioner.name cannot be empty");
        }
        if provisioner.resync_period.is_zero() {
            anyhow::bail!("spec.provisioner.resync_period must be greater than zero");
        }
        if provisioner.failed_retry_threshold == 0 {
            anyhow::bail!("spec.provisioner.failed_retry_threshold must be at least 1");
        }

        let ceph = &self.spec.ceph;
        if ceph.monitors.is_empty() {
            anyhow::bail!("spec.ceph.monitors must list at least one monitor");
        }
        if let Some(empty) = ceph.monitors.iter().position(|m| m.trim().is_empty()) {
            anyhow::bail!("spec.ceph.monitors[{}] cannot be empty", empty);
        }
        if ceph.admin.is_empty() {
            anyhow::bail!("spec.ceph.admin cannot be empty");
        }
        if ceph.secret_ref.name.is_empty() {
            anyhow::bail!("spec.ceph.secret_ref.name cannot be empty");
        }
        if !ceph.root_path.starts_with('/') {
            anyhow::bail!(
                "spec.ceph.root_path must be absolute, got '{}'",
                ceph.root_path
            );
        }
        if ceph.root_path.split('/').any(|segment| segment == "..") {
            anyhow::bail!("spec.ceph.root_path cannot contain '..'");
        }

        if let GatewayConfig::Mounted { mount_root } = &self.spec.gateway {
            if !mount_root.is_absolute() {
                anyhow::bail!(
                    "spec.gateway.mount_root must be absolute, got {:?}",
                    mount_root
                );
            }
        }

        Ok(())
    }
}

fn default_provisioner_name() -> String {
    "kubernetes.io/cephfs".to_string()
}

fn default_resync_period() -> Duration {
    Duration::from_secs(15)
}

fn default_failed_retry_threshold() -> u32 {
    5
}

fn default_monitors() -> Vec<String> {
    vec!["127.0.0.1:6789".to_string()]
}

fn default_admin() -> String {
    "admin".to_string()
}

fn default_secret_ref() -> SecretReference {
    SecretReference {
        name: "ceph-secret-admin".to_string(),
        namespace: None,
    }
}

fn default_root_path() -> String {
    "/volumes/kubernetes".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/cephfs-provisioner")
}

//! Core configuration types and loading.

use replikit_cluster::{ClusterBuilder, Member, MemberId, MemberType};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Client runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local member identity and cluster seeds.
    pub cluster: ClusterConfig,
    /// Session lifecycle policy.
    pub session: SessionConfig,
    /// Dispatch context selection.
    pub dispatch: DispatchConfig,
    /// Read cache defaults for primitives that enable caching.
    pub cache: CacheConfig,
    /// Blocking facade configuration.
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Local member identity and seed list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub member_id: u32,
    pub member_type: MemberType,
    pub address: SocketAddr,
    /// Distinct members that must report a PASSIVE member unreachable before it leaves.
    pub failure_threshold: usize,
    pub seeds: Vec<SeedConfig>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            member_id: 1,
            member_type: MemberType::Active,
            address: SocketAddr::from(([127, 0, 0, 1], 5679)),
            failure_threshold: replikit_cluster::DEFAULT_FAILURE_THRESHOLD,
            seeds: Vec::new(),
        }
    }
}

impl ClusterConfig {
    /// A cluster builder preloaded with this configuration.
    pub fn builder(&self) -> ClusterBuilder {
        ClusterBuilder::new()
            .with_member_id(MemberId::new(self.member_id))
            .with_member_type(self.member_type)
            .with_address(self.address)
            .with_failure_threshold(self.failure_threshold)
            .with_seeds(self.seeds.iter().map(SeedConfig::to_member))
    }
}

/// A seed member entry (`[[cluster.seeds]]`).
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub id: u32,
    pub address: SocketAddr,
    #[serde(default)]
    pub member_type: MemberType,
}

impl SeedConfig {
    pub fn to_member(&self) -> Member {
        Member::new(MemberId::new(self.id), self.address, self.member_type)
    }
}

/// What happens to operations issued while a session is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuspendPolicy {
    /// Hold operations until the session recovers or expires.
    #[default]
    Queue,
    /// Fail operations immediately with `SessionError::Suspended`.
    FailFast,
}

/// Session lifecycle policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub suspend_policy: SuspendPolicy,
    /// Longest time a session may stay SUSPENDED before it is expired locally.
    pub expiry_timeout_ms: u64,
    /// Resubmissions of one operation after transient unavailability.
    pub max_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            suspend_policy: SuspendPolicy::Queue,
            expiry_timeout_ms: 30_000,
            max_retries: 3,
        }
    }
}

impl SessionConfig {
    pub fn expiry_timeout(&self) -> Duration {
        Duration::from_millis(self.expiry_timeout_ms)
    }
}

/// How dispatch contexts are assigned to session clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One sequential context per session client.
    #[default]
    Dedicated,
    /// One sequential context shared by every client of a management service.
    Shared,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
}

/// Read cache policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_capacity: u64,
    /// Entry time-to-live. `None` keeps entries until evicted or invalidated.
    pub ttl_ms: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: 1024,
            ttl_ms: None,
        }
    }
}

impl CacheConfig {
    /// An enabled cache with the given capacity and no TTL.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            enabled: true,
            max_capacity,
            ttl_ms: None,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

/// Blocking facade configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

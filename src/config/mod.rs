//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, ClusterConfig, SessionConfig, ...)
//! - [`validation`]: Startup validation returning every problem found

mod types;
mod validation;

pub use types::{
    CacheConfig, ClusterConfig, Config, ConfigError, DispatchConfig, DispatchMode, SeedConfig,
    SessionConfig, SuspendPolicy, SyncConfig,
};
pub use validation::{ValidationError, validate};

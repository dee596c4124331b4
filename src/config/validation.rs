//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cluster.failure_threshold must be at least 1")]
    InvalidFailureThreshold,
    #[error("cluster.seeds lists member {0} more than once")]
    DuplicateSeed(u32),
    #[error("cluster.seeds lists the local member {0} with a different address")]
    ConflictingLocalSeed(u32),
    #[error("session.expiry_timeout_ms must be greater than zero")]
    ZeroExpiryTimeout,
    #[error("cache.max_capacity must be greater than zero when the cache is enabled")]
    ZeroCacheCapacity,
    #[error("cache.ttl_ms must be greater than zero when set")]
    ZeroCacheTtl,
    #[error("sync.timeout_ms must be greater than zero")]
    ZeroSyncTimeout,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.cluster.failure_threshold == 0 {
        errors.push(ValidationError::InvalidFailureThreshold);
    }

    let mut seen = HashSet::new();
    for seed in &config.cluster.seeds {
        if !seen.insert(seed.id) {
            errors.push(ValidationError::DuplicateSeed(seed.id));
        }
        if seed.id == config.cluster.member_id && seed.address != config.cluster.address {
            errors.push(ValidationError::ConflictingLocalSeed(seed.id));
        }
    }

    if config.session.expiry_timeout_ms == 0 {
        errors.push(ValidationError::ZeroExpiryTimeout);
    }

    if config.cache.enabled {
        if config.cache.max_capacity == 0 {
            errors.push(ValidationError::ZeroCacheCapacity);
        }
        if config.cache.ttl_ms == Some(0) {
            errors.push(ValidationError::ZeroCacheTtl);
        }
    }

    if config.sync.timeout_ms == 0 {
        errors.push(ValidationError::ZeroSyncTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn all_errors_are_reported() {
        let config = Config::parse(
            r#"
            [cluster]
            member_id = 1
            address = "127.0.0.1:5000"
            failure_threshold = 0
            [[cluster.seeds]]
            id = 1
            address = "127.0.0.1:6000"
            [[cluster.seeds]]
            id = 1
            address = "127.0.0.1:5000"
            [cache]
            enabled = true
            max_capacity = 0
            [sync]
            timeout_ms = 0
            "#,
        )
        .unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidFailureThreshold));
        assert!(errors.contains(&ValidationError::DuplicateSeed(1)));
        assert!(errors.contains(&ValidationError::ConflictingLocalSeed(1)));
        assert!(errors.contains(&ValidationError::ZeroCacheCapacity));
        assert!(errors.contains(&ValidationError::ZeroSyncTimeout));
        assert_eq!(errors.len(), 5);
    }
}

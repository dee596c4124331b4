//! Prometheus metrics collection for replikit.
//!
//! - `replikit_session_transitions_total{state}` - Session state transitions
//! - `replikit_operations_total{primitive,outcome}` - Completed operations
//! - `replikit_cache_requests_total{cache,result}` - Read cache hits and misses
//! - `replikit_cache_invalidations_total{cache}` - Event-driven invalidations
//! - `replikit_dispatch_held_completions` - Completions waiting for their turn
//!
//! Recording helpers are no-ops until [`init`] has been called.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Session state transitions by target state.
pub static SESSION_TRANSITIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Completed operations by primitive type and outcome.
pub static OPERATIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Read cache lookups by cache name and result (hit/miss).
pub static CACHE_REQUESTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Cache invalidations by cache name.
pub static CACHE_INVALIDATIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Completions currently held back by reorder buffers.
pub static DISPATCH_HELD: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(SESSION_TRANSITIONS, IntCounterVec::new(Opts::new("replikit_session_transitions_total", "Session state transitions"), &["state"]));
    register!(OPERATIONS, IntCounterVec::new(Opts::new("replikit_operations_total", "Completed primitive operations"), &["primitive", "outcome"]));
    register!(CACHE_REQUESTS, IntCounterVec::new(Opts::new("replikit_cache_requests_total", "Read cache lookups"), &["cache", "result"]));
    register!(CACHE_INVALIDATIONS, IntCounterVec::new(Opts::new("replikit_cache_invalidations_total", "Read cache invalidations"), &["cache"]));
    register!(DISPATCH_HELD, IntGauge::new("replikit_dispatch_held_completions", "Completions held by reorder buffers"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[inline]
pub fn record_transition(state: &str) {
    if let Some(c) = SESSION_TRANSITIONS.get() {
        c.with_label_values(&[state]).inc();
    }
}

#[inline]
pub fn record_operation(primitive: &str, outcome: &str) {
    if let Some(c) = OPERATIONS.get() {
        c.with_label_values(&[primitive, outcome]).inc();
    }
}

#[inline]
pub fn record_cache_lookup(cache: &str, hit: bool) {
    if let Some(c) = CACHE_REQUESTS.get() {
        c.with_label_values(&[cache, if hit { "hit" } else { "miss" }]).inc();
    }
}

#[inline]
pub fn record_cache_invalidation(cache: &str) {
    if let Some(c) = CACHE_INVALIDATIONS.get() {
        c.with_label_values(&[cache]).inc();
    }
}

#[inline]
pub fn adjust_held_completions(delta: i64) {
    if let Some(g) = DISPATCH_HELD.get() {
        g.add(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_metrics_are_rendered() {
        init();
        init();
        record_transition("connected");
        record_cache_lookup("metrics-test", true);
        let text = gather_metrics();
        assert!(text.contains("replikit_session_transitions_total"));
        assert!(text.contains("metrics-test"));
    }
}

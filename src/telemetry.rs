//! Telemetry utilities for session and operation correlation.

/// Standardized span constructors for session observability.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Create a span for a session client.
    pub fn session(name: &str, primitive_type: &str) -> Span {
        info_span!("session", name = %name, primitive = %primitive_type)
    }

    /// Create a span for one submitted operation.
    pub fn operation(name: &str, operation: &str, sequence: u64) -> Span {
        debug_span!("operation", name = %name, operation = %operation, sequence = sequence)
    }
}

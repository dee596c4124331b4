//! Unified error handling for replikit.
//!
//! Transport faults are translated into the session taxonomy at the session
//! client boundary. The dispatch, caching and blocking layers pass errors
//! through unchanged and only add timeout behavior of their own.

use replikit_cluster::SerializerError;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Session Errors (operation and lifecycle failures)
// ============================================================================

/// Errors observed by callers of a session client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The cluster no longer recognizes the session.
    #[error("session expired")]
    Expired,

    /// The operation was issued after the session was closed.
    #[error("session closed")]
    Closed,

    /// The replicated state machine rejected the operation.
    #[error("command failed: {0}")]
    CommandFailure(String),

    /// The session is suspended and the fail-fast policy is configured.
    #[error("session suspended")]
    Suspended,

    #[error("session not connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Expired => "session_expired",
            Self::Closed => "session_closed",
            Self::CommandFailure(_) => "command_failure",
            Self::Suspended => "session_suspended",
            Self::NotConnected => "not_connected",
            Self::Transport(_) => "transport_error",
        }
    }

    /// Whether the session can never serve another operation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Closed)
    }
}

// ============================================================================
// Transport Errors (raised by Transport implementations)
// ============================================================================

/// Errors raised by a [`crate::session::Transport`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("unknown session")]
    UnknownSession,

    /// No cluster member could be reached. Transient.
    #[error("cluster unavailable")]
    Unavailable,

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::UnknownSession => Self::Expired,
            TransportError::Rejected(reason) => Self::CommandFailure(reason),
            TransportError::Unavailable => Self::Transport("cluster unavailable".to_string()),
            TransportError::Io(reason) => Self::Transport(reason),
        }
    }
}

// ============================================================================
// Service Errors (replicated state machine)
// ============================================================================

/// Application-level rejection raised by a replicated service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CommandError(pub String);

impl From<SerializerError> for CommandError {
    fn from(err: SerializerError) -> Self {
        Self(format!("malformed operation: {err}"))
    }
}

// ============================================================================
// Primitive Errors (typed clients and the blocking facade)
// ============================================================================

/// Errors surfaced by typed primitive clients.
#[derive(Debug, Error)]
pub enum PrimitiveError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Raised only by the blocking facade.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] SerializerError),

    #[error("blocking call issued from an async runtime thread")]
    BlockingOnRuntime,

    #[error("unknown primitive type: {0}")]
    UnknownType(String),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Result type for typed primitive operations.
pub type PrimitiveResult<T> = Result<T, PrimitiveError>;

//! Session layer.
//!
//! A session is an ordered channel between one client and one replicated
//! state machine instance. [`DefaultSessionClient`] owns the lifecycle:
//!
//! ```text
//! UNCONNECTED ──▶ CONNECTING ──▶ CONNECTED ◀──▶ SUSPENDED
//!      │              │              │              │
//!      └──────────────┴──────────────┴──────────────┴──▶ CLOSED
//! ```
//!
//! A failed connect attempt returns to UNCONNECTED. CLOSED is terminal.

mod client;
mod single_flight;
mod transport;

pub use client::DefaultSessionClient;
pub use single_flight::SingleFlight;
pub use transport::{OpenSession, SessionHandle, SessionSignal, Transport};

use crate::error::SessionError;
use crate::primitive::{EventType, PrimitiveEvent, PrimitiveOperation, PrimitiveState, SessionId};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use replikit_cluster::Listener;

/// Lifecycle position of a session client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Unconnected,
    Connecting,
    Connected,
    Suspended,
    Closed,
}

impl SessionStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Unconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Unconnected)
                | (Connected, Suspended)
                | (Suspended, Connected)
                | (Unconnected | Connecting | Connected | Suspended, Closed)
        )
    }

    /// The state reported to state-change listeners, if any.
    pub fn primitive_state(self) -> Option<PrimitiveState> {
        match self {
            Self::Connected => Some(PrimitiveState::Connected),
            Self::Suspended => Some(PrimitiveState::Suspended),
            Self::Closed => Some(PrimitiveState::Closed),
            Self::Unconnected | Self::Connecting => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Suspended => "suspended",
            Self::Closed => "closed",
        }
    }
}

/// Client side of a session on one named primitive.
///
/// Every method that talks to the cluster returns a boxed `'static` future.
/// Operations are issued when the method is called, not when the future is
/// first polled: call order is sequence order, and dropping the future only
/// discards the result.
pub trait SessionClient: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn primitive_type(&self) -> &str;

    fn status(&self) -> SessionStatus;

    fn session_id(&self) -> Option<SessionId>;

    /// Establish the session, or join the attempt already in flight.
    fn connect(&self) -> BoxFuture<'static, Result<SessionId, SessionError>>;

    fn execute(&self, operation: PrimitiveOperation) -> BoxFuture<'static, Result<Bytes, SessionError>>;

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>);

    /// No-op when the listener was never added.
    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>);

    fn add_event_listener(&self, event_type: EventType, listener: Listener<PrimitiveEvent>);

    /// No-op when the listener was never added.
    fn remove_event_listener(&self, event_type: &EventType, listener: &Listener<PrimitiveEvent>);

    /// Close the session. Idempotent; later callers observe the same result.
    fn close(&self) -> BoxFuture<'static, Result<(), SessionError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_is_terminal() {
        use SessionStatus::*;
        for next in [Unconnected, Connecting, Connected, Suspended, Closed] {
            assert!(!Closed.can_transition(next));
        }
    }

    #[test]
    fn suspension_only_from_connected() {
        use SessionStatus::*;
        assert!(Connected.can_transition(Suspended));
        assert!(!Connecting.can_transition(Suspended));
        assert!(!Unconnected.can_transition(Suspended));
        assert!(Suspended.can_transition(Connected));
    }
}

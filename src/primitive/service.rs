//! Server-side replicated state machine contract.
//!
//! The replication engine constructs services through the type registry,
//! applies committed operations one at a time and fans the events a commit
//! publishes out to every session open on the primitive.

use super::types::{PrimitiveEvent, PrimitiveOperation, SessionId};
use crate::error::CommandError;
use bytes::Bytes;

/// Configuration handed to [`super::PrimitiveType::new_service`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    name: String,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name of the primitive instance the service backs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A committed operation being applied to a service.
#[derive(Debug)]
pub struct Commit {
    index: u64,
    session: SessionId,
    operation: PrimitiveOperation,
    timestamp: u64,
    events: Vec<PrimitiveEvent>,
}

impl Commit {
    pub fn new(index: u64, session: SessionId, operation: PrimitiveOperation, timestamp: u64) -> Self {
        Self {
            index,
            session,
            operation,
            timestamp,
            events: Vec::new(),
        }
    }

    /// Log index of this commit. Strictly increasing per service.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub fn operation(&self) -> &PrimitiveOperation {
        &self.operation
    }

    /// Wall-clock time of the commit in milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Queue an event for every session open on the primitive.
    pub fn publish(&mut self, event: PrimitiveEvent) {
        self.events.push(event);
    }

    pub fn into_events(self) -> Vec<PrimitiveEvent> {
        self.events
    }
}

/// A deterministic state machine replicated by the cluster.
pub trait ReplicatedService: Send {
    /// Apply one committed operation and return its encoded result.
    fn apply(&mut self, commit: &mut Commit) -> Result<Bytes, CommandError>;

    fn snapshot(&self) -> Result<Bytes, CommandError>;

    fn restore(&mut self, snapshot: &[u8]) -> Result<(), CommandError>;

    /// Called when a session is closed or expired.
    fn on_session_close(&mut self, _session: SessionId) {}
}

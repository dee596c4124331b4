//! Value types shared by sessions, services and typed clients.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session identifier issued by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of an operation understood by a replicated service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type tag of an event pushed by a replicated service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventType(String);

impl EventType {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One logical invocation: an operation name and its encoded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveOperation {
    id: OperationId,
    args: Bytes,
}

impl PrimitiveOperation {
    pub fn new(id: OperationId, args: Bytes) -> Self {
        Self { id, args }
    }

    /// An operation that takes no arguments.
    pub fn empty(id: OperationId) -> Self {
        Self::new(id, Bytes::new())
    }

    #[must_use]
    pub fn id(&self) -> &OperationId {
        &self.id
    }

    #[must_use]
    pub fn args(&self) -> &Bytes {
        &self.args
    }
}

/// An unsolicited event pushed from a replicated service to its sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveEvent {
    event_type: EventType,
    payload: Bytes,
}

impl PrimitiveEvent {
    pub fn new(event_type: EventType, payload: Bytes) -> Self {
        Self {
            event_type,
            payload,
        }
    }

    #[must_use]
    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

/// Session health as perceived by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveState {
    Connected,
    Suspended,
    Closed,
}

impl PrimitiveState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Suspended => "suspended",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for PrimitiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value tagged with the commit index that last wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
    /// Milliseconds since the Unix epoch at which the version was written.
    pub creation_time: u64,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: u64, creation_time: u64) -> Self {
        Self {
            value,
            version,
            creation_time,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            value: f(self.value),
            version: self.version,
            creation_time: self.creation_time,
        }
    }
}

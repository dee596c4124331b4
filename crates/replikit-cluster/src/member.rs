//! Member records and membership change events.
//!
//! Members are immutable once constructed. Topology changes replace or remove
//! whole records in the membership view.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Unique integer identity of a cluster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(u32);

impl MemberId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role a member plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    /// Explicitly configured voting participant. Never joins or leaves.
    #[default]
    Active,
    /// Dynamically joined member, subject to failure detection.
    Passive,
}

/// A member of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    id: MemberId,
    address: SocketAddr,
    member_type: MemberType,
}

impl Member {
    pub fn new(id: MemberId, address: SocketAddr, member_type: MemberType) -> Self {
        Self {
            id,
            address,
            member_type,
        }
    }

    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    #[must_use]
    pub fn member_type(&self) -> MemberType {
        self.member_type
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.member_type == MemberType::Active
    }
}

/// Kind of topology change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipEventKind {
    Join,
    Leave,
}

/// A topology change published by the membership view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEvent {
    kind: MembershipEventKind,
    member: Member,
}

impl MembershipEvent {
    pub fn join(member: Member) -> Self {
        Self {
            kind: MembershipEventKind::Join,
            member,
        }
    }

    pub fn leave(member: Member) -> Self {
        Self {
            kind: MembershipEventKind::Leave,
            member,
        }
    }

    #[must_use]
    pub fn kind(&self) -> MembershipEventKind {
        self.kind
    }

    #[must_use]
    pub fn member(&self) -> &Member {
        &self.member
    }
}

//! Cluster membership view and wire namespaces for replikit.
//!
//! This crate provides the cluster-facing half of the replikit client runtime:
//! the set of known members, the JOIN/LEAVE event stream produced by an
//! anti-flap failure detector, and the namespaced serializer every primitive
//! type uses to encode operations, results and events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐     ┌─────────────────────┐
//! │   ClusterBuilder    │     │   Namespace         │
//! │   (seeds, local)    │     │   (stable type ids) │
//! └──────────┬──────────┘     └──────────┬──────────┘
//!            │                           │
//!            ▼                           ▼
//! ┌──────────────────────────────────────────────────┐
//! │              Membership (this crate)             │
//! │  ┌──────────────────┐  ┌───────────────────────┐ │
//! │  │ FailureDetector  │  │   Serializer          │ │
//! │  │ (quorum reports) │  │   (id + msgpack)      │ │
//! │  └──────────────────┘  └───────────────────────┘ │
//! └──────────────────────────────────────────────────┘
//!            │                           │
//!            ▼                           ▼
//! ┌──────────────────────────────────────────────────┐
//! │   Session layer (reconnection target selection)  │
//! │   Messenger (best-effort broadcast fan-out)      │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! # Membership Rules
//!
//! - **ACTIVE** members are explicitly configured voting participants. They
//!   never produce JOIN or LEAVE events.
//! - **PASSIVE** members join and leave dynamically. A LEAVE is emitted only
//!   after contact failures have been reported by several distinct members.

pub mod builder;
pub mod detector;
pub mod error;
pub mod listener;
pub mod member;
pub mod serializer;
pub mod view;

pub use builder::ClusterBuilder;
pub use detector::{FailureDetector, DEFAULT_FAILURE_THRESHOLD};
pub use error::{ClusterError, SerializerError};
pub use listener::{Listener, ListenerKey, ListenerSet};
pub use member::{Member, MemberId, MemberType, MembershipEvent, MembershipEventKind};
pub use serializer::{Namespace, NamespaceBuilder, Serializer, BEGIN_USER_CUSTOM_ID};
pub use view::{Membership, MembershipView, Messenger, NoopMessenger};

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    /// Verify all public re-exports are accessible.
    #[test]
    fn test_public_reexports() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let member = Member::new(MemberId::new(1), addr, MemberType::Active);
        let _event = MembershipEvent::join(member);
        let _detector = FailureDetector::new(DEFAULT_FAILURE_THRESHOLD);
        let _serializer = Serializer::new(Namespace::basic());
        let _builder = ClusterBuilder::new();
    }
}

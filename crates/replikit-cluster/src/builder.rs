//! Builder for a managed membership view.

use crate::detector::DEFAULT_FAILURE_THRESHOLD;
use crate::error::ClusterError;
use crate::member::{Member, MemberId, MemberType};
use crate::serializer::Serializer;
use crate::view::{Membership, Messenger, NoopMessenger};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

/// Configures and builds a [`Membership`].
pub struct ClusterBuilder {
    member_id: Option<MemberId>,
    member_type: MemberType,
    address: Option<SocketAddr>,
    serializer: Option<Serializer>,
    seeds: Vec<Member>,
    messenger: Option<Arc<dyn Messenger>>,
    failure_threshold: usize,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self {
            member_id: None,
            member_type: MemberType::Active,
            address: None,
            serializer: None,
            seeds: Vec::new(),
            messenger: None,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    pub fn with_member_id(mut self, id: MemberId) -> Self {
        self.member_id = Some(id);
        self
    }

    pub fn with_member_type(mut self, member_type: MemberType) -> Self {
        self.member_type = member_type;
        self
    }

    pub fn with_address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Replace the seed set.
    pub fn with_seeds<I>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = Member>,
    {
        self.seeds = seeds.into_iter().collect();
        self
    }

    pub fn add_seed(mut self, member: Member) -> Self {
        self.seeds.push(member);
        self
    }

    pub fn with_messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    pub fn with_failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<Arc<Membership>, ClusterError> {
        let id = self.member_id.ok_or(ClusterError::MissingMemberId)?;
        let address = self.address.ok_or(ClusterError::MissingAddress)?;

        let mut seen = HashSet::new();
        for seed in &self.seeds {
            if !seen.insert(seed.id()) {
                return Err(ClusterError::DuplicateSeed(seed.id()));
            }
        }
        // The local member may appear in its own seed list; the local record wins.
        let seeds = self.seeds.into_iter().filter(|seed| seed.id() != id).collect();

        Ok(Arc::new(Membership::new(
            Member::new(id, address, self.member_type),
            seeds,
            self.serializer.unwrap_or_default(),
            self.messenger.unwrap_or_else(|| Arc::new(NoopMessenger)),
            self.failure_threshold,
        )))
    }
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::MembershipView;

    fn seed(id: u32) -> Member {
        Member::new(MemberId::new(id), format!("10.0.0.{id}:5000").parse().unwrap(), MemberType::Active)
    }

    #[test]
    fn build_requires_identity() {
        assert!(matches!(ClusterBuilder::new().build(), Err(ClusterError::MissingMemberId)));
        assert!(matches!(
            ClusterBuilder::new().with_member_id(MemberId::new(1)).build(),
            Err(ClusterError::MissingAddress)
        ));
    }

    #[test]
    fn duplicate_seeds_are_rejected() {
        let result = ClusterBuilder::new()
            .with_member_id(MemberId::new(1))
            .with_address("10.0.0.1:5000".parse().unwrap())
            .with_seeds([seed(2), seed(2)])
            .build();
        assert!(matches!(result, Err(ClusterError::DuplicateSeed(id)) if id == MemberId::new(2)));
    }

    #[test]
    fn local_member_overrides_its_seed_entry() {
        let view = ClusterBuilder::new()
            .with_member_id(MemberId::new(1))
            .with_member_type(MemberType::Passive)
            .with_address("10.0.0.1:6000".parse().unwrap())
            .with_seeds([seed(1), seed(2)])
            .add_seed(seed(3))
            .build()
            .unwrap();
        assert_eq!(view.members().len(), 3);
        assert_eq!(view.local_member().member_type(), MemberType::Passive);
        assert_eq!(view.member(MemberId::new(1)).unwrap().address().port(), 6000);
    }
}

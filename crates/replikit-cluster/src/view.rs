//! The membership view consumed by the session layer.
//!
//! The session layer reads the current member set to select reconnection
//! targets and subscribes to JOIN/LEAVE events. [`Membership`] is the managed
//! implementation built by [`crate::ClusterBuilder`].

use crate::detector::FailureDetector;
use crate::error::{ClusterError, SerializerError};
use crate::listener::{Listener, ListenerSet};
use crate::member::{Member, MemberId, MembershipEvent};
use crate::serializer::Serializer;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Read-only view of cluster topology.
pub trait MembershipView: Send + Sync {
    fn local_member(&self) -> Member;

    fn member(&self, id: MemberId) -> Option<Member>;

    /// All known members, including the local member, ordered by id.
    fn members(&self) -> Vec<Member>;

    fn add_membership_listener(&self, listener: Listener<MembershipEvent>);

    /// Remove a membership listener. A listener that was never added is ignored.
    fn remove_membership_listener(&self, listener: &Listener<MembershipEvent>);

    fn serializer(&self) -> &Serializer;

    /// Best-effort, unordered, reply-less fan-out to every other known member.
    fn broadcast(&self, topic: &str, payload: Bytes);
}

/// Outbound delivery used for broadcast fan-out.
pub trait Messenger: Send + Sync {
    fn send(&self, to: &Member, topic: &str, payload: Bytes) -> Result<(), ClusterError>;
}

/// Messenger that drops every message. Used when no transport is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMessenger;

impl Messenger for NoopMessenger {
    fn send(&self, _to: &Member, _topic: &str, _payload: Bytes) -> Result<(), ClusterError> {
        Ok(())
    }
}

/// Managed membership view with failure detection.
pub struct Membership {
    local: Member,
    members: DashMap<MemberId, Member>,
    listeners: ListenerSet<MembershipEvent>,
    detector: FailureDetector,
    serializer: Serializer,
    messenger: Arc<dyn Messenger>,
}

impl Membership {
    pub(crate) fn new(
        local: Member,
        seeds: Vec<Member>,
        serializer: Serializer,
        messenger: Arc<dyn Messenger>,
        failure_threshold: usize,
    ) -> Self {
        let members = DashMap::new();
        for seed in seeds {
            members.insert(seed.id(), seed);
        }
        members.insert(local.id(), local.clone());
        Self {
            local,
            members,
            listeners: ListenerSet::new(),
            detector: FailureDetector::new(failure_threshold),
            serializer,
            messenger,
        }
    }

    /// Record a member joining. Returns `false` if it was already known.
    ///
    /// Only PASSIVE members produce a JOIN event.
    pub fn join(&self, member: Member) -> bool {
        if self.members.contains_key(&member.id()) {
            return false;
        }
        self.members.insert(member.id(), member.clone());
        self.detector.forget(member.id());
        if !member.is_active() {
            info!(member = %member.id(), address = %member.address(), "Member joined");
            self.listeners.notify(&MembershipEvent::join(member));
        }
        true
    }

    /// Record that `reporter` failed to contact `target`.
    ///
    /// Returns the LEAVE event if this report pushed the target over the
    /// failure threshold. ACTIVE members never leave.
    pub fn report_unreachable(&self, reporter: MemberId, target: MemberId) -> Option<MembershipEvent> {
        let member = self.members.get(&target).map(|m| m.value().clone())?;
        if !self.detector.report_unreachable(reporter, &member) {
            debug!(
                member = %target,
                reporter = %reporter,
                reports = self.detector.suspicion_count(target),
                "Contact failure recorded"
            );
            return None;
        }
        self.members.remove(&target);
        self.detector.forget(target);
        info!(member = %target, "Member declared departed");
        let event = MembershipEvent::leave(member);
        self.listeners.notify(&event);
        Some(event)
    }

    pub fn report_reachable(&self, target: MemberId) {
        self.detector.report_reachable(target);
    }

    #[must_use]
    pub fn failure_threshold(&self) -> usize {
        self.detector.threshold()
    }

    /// Encode `message` with the cluster serializer and broadcast it.
    pub fn broadcast_message<T>(&self, topic: &str, message: &T) -> Result<(), SerializerError>
    where
        T: Serialize + 'static,
    {
        let payload = self.serializer.encode(message)?;
        self.broadcast(topic, payload);
        Ok(())
    }
}

impl MembershipView for Membership {
    fn local_member(&self) -> Member {
        self.local.clone()
    }

    fn member(&self, id: MemberId) -> Option<Member> {
        self.members.get(&id).map(|m| m.value().clone())
    }

    fn members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self.members.iter().map(|m| m.value().clone()).collect();
        members.sort_by_key(Member::id);
        members
    }

    fn add_membership_listener(&self, listener: Listener<MembershipEvent>) {
        self.listeners.add(listener);
    }

    fn remove_membership_listener(&self, listener: &Listener<MembershipEvent>) {
        self.listeners.remove(&listener.key());
    }

    fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    fn broadcast(&self, topic: &str, payload: Bytes) {
        for member in self.members() {
            if member.id() == self.local.id() {
                continue;
            }
            if let Err(e) = self.messenger.send(&member, topic, payload.clone()) {
                debug!(member = %member.id(), topic = %topic, error = %e, "Broadcast delivery failed");
            }
        }
    }
}

impl std::fmt::Debug for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership")
            .field("local", &self.local)
            .field("members", &self.members.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{MemberType, MembershipEventKind};
    use parking_lot::Mutex;

    fn member(id: u32, member_type: MemberType) -> Member {
        Member::new(MemberId::new(id), format!("127.0.0.1:{}", 6000 + id).parse().unwrap(), member_type)
    }

    fn membership() -> Membership {
        Membership::new(
            member(1, MemberType::Active),
            vec![member(2, MemberType::Active), member(3, MemberType::Active)],
            Serializer::default(),
            Arc::new(NoopMessenger),
            2,
        )
    }

    fn recorder(view: &Membership) -> Arc<Mutex<Vec<MembershipEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        view.add_membership_listener(Listener::new(move |e: MembershipEvent| sink.lock().push(e)));
        events
    }

    #[test]
    fn members_are_sorted_and_include_local() {
        let view = membership();
        let ids: Vec<u32> = view.members().iter().map(|m| m.id().value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(view.local_member().id(), MemberId::new(1));
    }

    #[test]
    fn passive_join_and_leave_are_published() {
        let view = membership();
        let events = recorder(&view);
        assert!(view.join(member(9, MemberType::Passive)));
        assert!(!view.join(member(9, MemberType::Passive)));

        assert!(view.report_unreachable(MemberId::new(1), MemberId::new(9)).is_none());
        let leave = view.report_unreachable(MemberId::new(2), MemberId::new(9)).unwrap();
        assert_eq!(leave.kind(), MembershipEventKind::Leave);
        assert!(view.member(MemberId::new(9)).is_none());

        let kinds: Vec<_> = events.lock().iter().map(MembershipEvent::kind).collect();
        assert_eq!(kinds, vec![MembershipEventKind::Join, MembershipEventKind::Leave]);
    }

    #[test]
    fn active_members_never_leave() {
        let view = membership();
        let events = recorder(&view);
        for reporter in 1..=10 {
            assert!(view.report_unreachable(MemberId::new(reporter), MemberId::new(2)).is_none());
        }
        assert!(view.member(MemberId::new(2)).is_some());
        assert!(events.lock().is_empty());
    }

    struct Recording(Mutex<Vec<(MemberId, String)>>);

    impl Messenger for Recording {
        fn send(&self, to: &Member, topic: &str, _payload: Bytes) -> Result<(), ClusterError> {
            self.0.lock().push((to.id(), topic.to_string()));
            if to.id() == MemberId::new(2) {
                return Err(ClusterError::Unreachable(to.id()));
            }
            Ok(())
        }
    }

    #[test]
    fn broadcast_skips_local_and_ignores_failures() {
        let messenger = Arc::new(Recording(Mutex::new(Vec::new())));
        let view = Membership::new(
            member(1, MemberType::Active),
            vec![member(2, MemberType::Active), member(3, MemberType::Passive)],
            Serializer::default(),
            messenger.clone(),
            3,
        );
        view.broadcast_message("config", &"reload".to_string()).unwrap();
        let sent: Vec<u32> = messenger.0.lock().iter().map(|(id, _)| id.value()).collect();
        assert_eq!(sent, vec![2, 3]);
    }

    #[test]
    fn removing_unknown_listener_is_noop() {
        let view = membership();
        view.remove_membership_listener(&Listener::new(|_: MembershipEvent| {}));
    }
}

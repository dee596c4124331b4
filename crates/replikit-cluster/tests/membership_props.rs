//! Property tests for membership event generation.

use parking_lot::Mutex;
use proptest::prelude::*;
use replikit_cluster::{
    ClusterBuilder, Listener, Member, MemberId, MemberType, MembershipEvent, MembershipEventKind, MembershipView,
};
use std::sync::Arc;

fn member(id: u32, member_type: MemberType) -> Member {
    Member::new(MemberId::new(id), format!("127.0.0.1:{}", 7000 + id).parse().unwrap(), member_type)
}

proptest! {
    /// No sequence of contact failures ever produces a LEAVE for an ACTIVE member,
    /// and a PASSIVE member leaves at most once.
    #[test]
    fn leave_is_never_emitted_for_active_members(
        threshold in 1usize..5,
        reports in prop::collection::vec((1u32..8, 1u32..8), 0..200),
    ) {
        // Members 1..=4 are ACTIVE seeds, 5..=7 join as PASSIVE.
        let view = ClusterBuilder::new()
            .with_member_id(MemberId::new(1))
            .with_address("127.0.0.1:7001".parse().unwrap())
            .with_seeds((2..=4).map(|id| member(id, MemberType::Active)))
            .with_failure_threshold(threshold)
            .build()
            .unwrap();
        for id in 5..=7 {
            view.join(member(id, MemberType::Passive));
        }

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        view.add_membership_listener(Listener::new(move |e: MembershipEvent| sink.lock().push(e)));

        for (reporter, target) in reports {
            view.report_unreachable(MemberId::new(reporter), MemberId::new(target));
        }

        let events = events.lock();
        let mut left = Vec::new();
        for event in events.iter() {
            prop_assert_eq!(event.kind(), MembershipEventKind::Leave);
            prop_assert!(!event.member().is_active());
            prop_assert!(!left.contains(&event.member().id()));
            left.push(event.member().id());
        }
        for id in 1..=4 {
            prop_assert!(view.member(MemberId::new(id)).is_some());
        }
    }
}

//! Anti-flap failure detection.
//!
//! A member is declared departed only after contact failures have been
//! reported by `threshold` distinct members. A single partitioned observer can
//! therefore never evict a healthy member on its own. ACTIVE members are
//! explicitly configured and are never declared departed.

use crate::member::{Member, MemberId};
use dashmap::DashMap;
use std::collections::HashSet;

/// Number of distinct reporters required before a member is declared departed.
pub const DEFAULT_FAILURE_THRESHOLD: usize = 3;

/// Tracks unreachability reports per member.
#[derive(Debug)]
pub struct FailureDetector {
    threshold: usize,
    suspicions: DashMap<MemberId, HashSet<MemberId>>,
}

impl FailureDetector {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            suspicions: DashMap::new(),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Record that `reporter` failed to contact `target`.
    ///
    /// Returns `true` exactly once: when the number of distinct reporters
    /// reaches the threshold.
    pub fn report_unreachable(&self, reporter: MemberId, target: &Member) -> bool {
        if target.is_active() || reporter == target.id() {
            return false;
        }
        let mut reporters = self.suspicions.entry(target.id()).or_default();
        reporters.insert(reporter) && reporters.len() == self.threshold
    }

    /// Clear all suspicion about a member after successful contact.
    pub fn report_reachable(&self, target: MemberId) {
        self.suspicions.remove(&target);
    }

    pub fn forget(&self, target: MemberId) {
        self.suspicions.remove(&target);
    }

    #[must_use]
    pub fn suspicion_count(&self, target: MemberId) -> usize {
        self.suspicions.get(&target).map_or(0, |r| r.len())
    }
}

impl Default for FailureDetector {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::MemberType;

    fn member(id: u32, member_type: MemberType) -> Member {
        Member::new(MemberId::new(id), format!("127.0.0.1:{}", 5000 + id).parse().unwrap(), member_type)
    }

    #[test]
    fn repeated_reports_from_one_member_do_not_count() {
        let detector = FailureDetector::new(3);
        let target = member(9, MemberType::Passive);
        for _ in 0..10 {
            assert!(!detector.report_unreachable(MemberId::new(1), &target));
        }
        assert_eq!(detector.suspicion_count(target.id()), 1);
    }

    #[test]
    fn declares_once_at_threshold() {
        let detector = FailureDetector::new(3);
        let target = member(9, MemberType::Passive);
        assert!(!detector.report_unreachable(MemberId::new(1), &target));
        assert!(!detector.report_unreachable(MemberId::new(2), &target));
        assert!(detector.report_unreachable(MemberId::new(3), &target));
        assert!(!detector.report_unreachable(MemberId::new(4), &target));
    }

    #[test]
    fn active_members_are_never_declared() {
        let detector = FailureDetector::new(1);
        let target = member(9, MemberType::Active);
        assert!(!detector.report_unreachable(MemberId::new(1), &target));
        assert_eq!(detector.suspicion_count(target.id()), 0);
    }

    #[test]
    fn reachable_clears_suspicion() {
        let detector = FailureDetector::new(2);
        let target = member(9, MemberType::Passive);
        detector.report_unreachable(MemberId::new(1), &target);
        detector.report_reachable(target.id());
        assert!(!detector.report_unreachable(MemberId::new(2), &target));
    }
}

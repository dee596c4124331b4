//! Integration test common infrastructure.
//!
//! Provides a scripted transport whose completions can be held and released
//! in any order, a three-member cluster view, and management service setup
//! over the in-process replica.

pub mod scripted;

#[allow(unused_imports)]
pub use scripted::ScriptedTransport;

use replikit::config::Config;
use replikit::{LocalTransport, PrimitiveManagementService, PrimitiveTypeRegistry};
use replikit_cluster::{ClusterBuilder, Member, MemberId, MemberType, Membership};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// A cluster view with local member 1 and seeds 2 and 3, all ACTIVE.
#[allow(dead_code)]
pub fn three_member_view() -> Arc<Membership> {
    ClusterBuilder::new()
        .with_member_id(MemberId::new(1))
        .with_address("127.0.0.1:7001".parse().expect("address"))
        .add_seed(Member::new(
            MemberId::new(2),
            "127.0.0.1:7002".parse().expect("address"),
            MemberType::Active,
        ))
        .add_seed(Member::new(
            MemberId::new(3),
            "127.0.0.1:7003".parse().expect("address"),
            MemberType::Active,
        ))
        .build()
        .expect("cluster view")
}

/// Management service over a fresh in-process replica.
#[allow(dead_code)]
pub fn local_management(config: &Config, handle: Handle) -> (Arc<LocalTransport>, PrimitiveManagementService) {
    let registry = PrimitiveTypeRegistry::global();
    let transport = Arc::new(LocalTransport::new(registry.clone()));
    let management = PrimitiveManagementService::new(transport.clone(), three_member_view(), config, handle)
        .with_registry(registry);
    (transport, management)
}

/// Poll `condition` until it holds or a second elapses.
#[allow(dead_code)]
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

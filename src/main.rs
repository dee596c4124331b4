//! replikit demo: multimap, counter and set round-trips through the full client stack
//! against an in-process replica.

use replikit::config::{self, CacheConfig, Config};
use replikit::counter::AsyncAtomicCounter;
use replikit::multimap::{AsyncAtomicMultimap, AsyncMultimapRead, AsyncMultimapWrite, MultimapEvent};
use replikit::set::{AsyncAtomicSet, AsyncNavigableSet, AsyncSetWrite};
use replikit::{LocalTransport, PrimitiveManagementService, PrimitiveTypeRegistry, metrics};
use replikit_cluster::{Listener, MembershipEvent, MembershipView};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "replikit.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).map_err(|e| {
            error!(path = %config_path, error = %e, "Failed to load config");
            e
        })?
    } else {
        warn!(path = %config_path, "Config file not found, using defaults");
        Config::default()
    };

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!("configuration has {} error(s)", errors.len()));
    }

    metrics::init();

    let membership = config.cluster.builder().build()?;
    membership.add_membership_listener(Listener::new(|event: MembershipEvent| {
        info!(kind = ?event.kind(), member = %event.member().id(), "Membership changed");
    }));
    info!(
        member = %membership.local_member().id(),
        members = membership.members().len(),
        "Starting replikit"
    );

    let registry = PrimitiveTypeRegistry::global();
    let transport = Arc::new(LocalTransport::new(registry.clone()));
    let management = PrimitiveManagementService::new(transport.clone(), membership, &config, Handle::current())
        .with_registry(registry);

    let multimap = management
        .atomic_multimap_builder::<String, String>("demo")
        .with_cache(CacheConfig::with_capacity(config.cache.max_capacity))
        .build()
        .await?;
    multimap.add_listener(Listener::new(|event: MultimapEvent<String, String>| {
        info!(kind = ?event.kind, key = %event.key, value = %event.value, "Change event");
    }));

    let key = "k".to_string();
    multimap.put(&key, &"v1".to_string()).await?;
    multimap.put(&key, &"v2".to_string()).await?;
    let values = multimap.get(&key).await?;
    info!(key = %key, values = ?values.value, version = values.version, "Read back");

    let counter = management.atomic_counter_builder("demo-counter").build().await?;
    let count = counter.increment_and_get().await?;
    info!(count, "Counter incremented");

    let set = management.atomic_set_builder::<i64>("demo-set").build().await?;
    set.add_all(&[40, -5, 12]).await?;
    let floor = set.floor(&20).await?;
    info!(first = ?set.first().await?, floor = ?floor, "Set navigated");

    multimap.close().await?;
    counter.close().await?;
    set.close().await?;
    info!(sessions = transport.session_count(), "Closed primitives");
    print!("{}", metrics::gather_metrics());
    Ok(())
}

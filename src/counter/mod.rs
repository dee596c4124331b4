//! Atomic counter primitive.

mod service;

pub use service::AtomicCounterService;

use crate::blocking::Blocking;
use crate::error::PrimitiveResult;
use crate::primitive::{
    PrimitiveBuilderFactory, PrimitiveManagementService, PrimitiveProxy, PrimitiveState, PrimitiveType,
    ReplicatedService, ServiceConfig, client_serializer,
};
use async_trait::async_trait;
use replikit_cluster::{Listener, Namespace};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Registry name of the atomic counter type.
pub const TYPE_NAME: &str = "atomic-counter";

/// Operation names understood by [`AtomicCounterService`].
pub mod ops {
    pub const GET: &str = "get";
    pub const SET: &str = "set";
    pub const ADD_AND_GET: &str = "add_and_get";
    pub const INCREMENT_AND_GET: &str = "increment_and_get";
    pub const COMPARE_AND_SET: &str = "compare_and_set";
}

/// Arguments of `compare_and_set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareAndSet {
    pub expect: i64,
    pub update: i64,
}

/// Asynchronous atomic counter client.
#[async_trait]
pub trait AsyncAtomicCounter: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self) -> PrimitiveResult<i64>;

    async fn set(&self, value: i64) -> PrimitiveResult<()>;

    async fn add_and_get(&self, delta: i64) -> PrimitiveResult<i64>;

    async fn increment_and_get(&self) -> PrimitiveResult<i64>;

    /// Set to `update` if the current value is `expect`.
    async fn compare_and_set(&self, expect: i64, update: i64) -> PrimitiveResult<bool>;

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>);

    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>);

    async fn close(&self) -> PrimitiveResult<()>;
}

/// Session-backed counter client.
#[derive(Debug, Clone)]
pub struct CounterProxy {
    proxy: PrimitiveProxy,
}

impl CounterProxy {
    pub fn new(proxy: PrimitiveProxy) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl AsyncAtomicCounter for CounterProxy {
    fn name(&self) -> &str {
        self.proxy.name()
    }

    async fn get(&self) -> PrimitiveResult<i64> {
        self.proxy.invoke_empty(ops::GET).await
    }

    async fn set(&self, value: i64) -> PrimitiveResult<()> {
        self.proxy.invoke(ops::SET, &value).await
    }

    async fn add_and_get(&self, delta: i64) -> PrimitiveResult<i64> {
        self.proxy.invoke(ops::ADD_AND_GET, &delta).await
    }

    async fn increment_and_get(&self) -> PrimitiveResult<i64> {
        self.proxy.invoke_empty(ops::INCREMENT_AND_GET).await
    }

    async fn compare_and_set(&self, expect: i64, update: i64) -> PrimitiveResult<bool> {
        self.proxy
            .invoke(ops::COMPARE_AND_SET, &CompareAndSet { expect, update })
            .await
    }

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>) {
        self.proxy.add_state_change_listener(listener);
    }

    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>) {
        self.proxy.remove_state_change_listener(listener);
    }

    async fn close(&self) -> PrimitiveResult<()> {
        self.proxy.close().await
    }
}

/// Synchronous counter client bounded by the configured timeout.
///
/// Calls from runtime threads, `spawn_blocking` workers included, fail with
/// [`crate::error::PrimitiveError::BlockingOnRuntime`].
pub struct BlockingAtomicCounter {
    delegate: Arc<dyn AsyncAtomicCounter>,
    blocking: Blocking,
}

impl BlockingAtomicCounter {
    pub fn new(delegate: Arc<dyn AsyncAtomicCounter>, blocking: Blocking) -> Self {
        Self { delegate, blocking }
    }

    #[must_use]
    pub fn async_counter(&self) -> &Arc<dyn AsyncAtomicCounter> {
        &self.delegate
    }

    pub fn get(&self) -> PrimitiveResult<i64> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.get().await })
    }

    pub fn set(&self, value: i64) -> PrimitiveResult<()> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.set(value).await })
    }

    pub fn add_and_get(&self, delta: i64) -> PrimitiveResult<i64> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.add_and_get(delta).await })
    }

    pub fn increment_and_get(&self) -> PrimitiveResult<i64> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.increment_and_get().await })
    }

    pub fn compare_and_set(&self, expect: i64, update: i64) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking
            .wait(async move { delegate.compare_and_set(expect, update).await })
    }

    pub fn close(&self) -> PrimitiveResult<()> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.close().await })
    }
}

/// Builds connected atomic counter clients.
#[derive(Debug)]
pub struct AtomicCounterBuilder {
    name: String,
    management: PrimitiveManagementService,
}

impl AtomicCounterBuilder {
    pub fn new(name: &str, management: &PrimitiveManagementService) -> Self {
        Self {
            name: name.to_string(),
            management: management.clone(),
        }
    }

    pub async fn build(self) -> PrimitiveResult<Arc<dyn AsyncAtomicCounter>> {
        let serializer = client_serializer(&AtomicCounterType::instance().namespace(), None);
        let client = self.management.session_client(&self.name, TYPE_NAME)?;
        client.connect().await?;
        info!(primitive = %self.name, "built atomic counter");
        Ok(Arc::new(CounterProxy::new(PrimitiveProxy::new(client, serializer))))
    }

    pub fn build_sync(self) -> PrimitiveResult<BlockingAtomicCounter> {
        let blocking = Blocking::new(
            self.management.contexts().handle().clone(),
            self.management.sync_config().timeout(),
        );
        let delegate = blocking.wait(self.build())?;
        Ok(BlockingAtomicCounter::new(delegate, blocking))
    }
}

/// The `atomic-counter` primitive type.
#[derive(Debug, Default)]
pub struct AtomicCounterType;

impl AtomicCounterType {
    /// The process-wide instance.
    pub fn instance() -> Arc<AtomicCounterType> {
        static INSTANCE: OnceLock<Arc<AtomicCounterType>> = OnceLock::new();
        INSTANCE.get_or_init(|| Arc::new(AtomicCounterType)).clone()
    }
}

impl PrimitiveType for AtomicCounterType {
    fn name(&self) -> &'static str {
        TYPE_NAME
    }

    fn namespace(&self) -> Namespace {
        Namespace::builder()
            .register_all(&Namespace::basic())
            .next_id(100)
            .register::<CompareAndSet>()
            .build()
    }

    fn new_service(&self, config: &ServiceConfig) -> Box<dyn ReplicatedService> {
        Box::new(AtomicCounterService::new(config, self.namespace()))
    }
}

impl PrimitiveBuilderFactory<AtomicCounterBuilder> for AtomicCounterType {
    type Config = ();

    fn new_builder(&self, name: &str, _config: (), management: &PrimitiveManagementService) -> AtomicCounterBuilder {
        AtomicCounterBuilder::new(name, management)
    }
}

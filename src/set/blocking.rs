//! Blocking set facade.

use super::{AsyncAtomicSet, SetElement, SetEvent};
use crate::blocking::Blocking;
use crate::error::PrimitiveResult;
use crate::primitive::PrimitiveState;
use replikit_cluster::Listener;
use std::sync::Arc;

/// Synchronous set client bounded by the configured timeout.
///
/// Calls from runtime threads fail with
/// [`crate::error::PrimitiveError::BlockingOnRuntime`], `spawn_blocking`
/// workers included. Call from a [`std::thread`].
pub struct BlockingAtomicSet<E: SetElement> {
    delegate: Arc<dyn AsyncAtomicSet<E>>,
    blocking: Blocking,
}

impl<E: SetElement> BlockingAtomicSet<E> {
    pub fn new(delegate: Arc<dyn AsyncAtomicSet<E>>, blocking: Blocking) -> Self {
        Self { delegate, blocking }
    }

    #[must_use]
    pub fn async_set(&self) -> &Arc<dyn AsyncAtomicSet<E>> {
        &self.delegate
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.delegate.name()
    }

    pub fn contains(&self, element: E) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.contains(&element).await })
    }

    pub fn size(&self) -> PrimitiveResult<u64> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.size().await })
    }

    pub fn elements(&self) -> PrimitiveResult<Vec<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.elements().await })
    }

    pub fn add(&self, element: E) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.add(&element).await })
    }

    pub fn add_all(&self, elements: Vec<E>) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.add_all(&elements).await })
    }

    pub fn remove(&self, element: E) -> PrimitiveResult<bool> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.remove(&element).await })
    }

    pub fn clear(&self) -> PrimitiveResult<()> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.clear().await })
    }

    pub fn first(&self) -> PrimitiveResult<Option<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.first().await })
    }

    pub fn last(&self) -> PrimitiveResult<Option<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.last().await })
    }

    pub fn floor(&self, element: E) -> PrimitiveResult<Option<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.floor(&element).await })
    }

    pub fn ceiling(&self, element: E) -> PrimitiveResult<Option<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.ceiling(&element).await })
    }

    pub fn lower(&self, element: E) -> PrimitiveResult<Option<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.lower(&element).await })
    }

    pub fn higher(&self, element: E) -> PrimitiveResult<Option<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.higher(&element).await })
    }

    pub fn poll_first(&self) -> PrimitiveResult<Option<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.poll_first().await })
    }

    pub fn poll_last(&self) -> PrimitiveResult<Option<E>> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.poll_last().await })
    }

    pub fn add_listener(&self, listener: Listener<SetEvent<E>>) {
        self.delegate.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Listener<SetEvent<E>>) {
        self.delegate.remove_listener(listener);
    }

    pub fn add_state_change_listener(&self, listener: Listener<PrimitiveState>) {
        self.delegate.add_state_change_listener(listener);
    }

    pub fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>) {
        self.delegate.remove_state_change_listener(listener);
    }

    pub fn close(&self) -> PrimitiveResult<()> {
        let delegate = self.delegate.clone();
        self.blocking.wait(async move { delegate.close().await })
    }
}

impl<E: SetElement> std::fmt::Debug for BlockingAtomicSet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingAtomicSet")
            .field("timeout", &self.blocking.timeout())
            .finish()
    }
}

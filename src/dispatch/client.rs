//! Session client decorator that delivers everything on a dispatch context.

use super::context::ThreadContext;
use super::relay::OrderedRelay;
use crate::error::SessionError;
use crate::primitive::{EventType, PrimitiveEvent, PrimitiveOperation, PrimitiveState, SessionId};
use crate::session::{SessionClient, SessionStatus, SingleFlight};
use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};
use replikit_cluster::{Listener, ListenerKey};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Wraps a [`SessionClient`] so that every listener callback and every
/// operation completion runs on one [`ThreadContext`], with completions
/// observed in submission order.
///
/// Listeners are wrapped on registration. The wrapper is tracked by the
/// original listener's key so removal unregisters the same wrapper.
pub struct ContextSessionClient<S: ?Sized> {
    inner: Arc<S>,
    relay: Arc<OrderedRelay>,
    state_wrappers: DashMap<ListenerKey, Listener<PrimitiveState>>,
    event_wrappers: DashMap<(EventType, ListenerKey), Listener<PrimitiveEvent>>,
    connecting: Arc<SingleFlight<Result<SessionId, SessionError>>>,
    closing: SingleFlight<Result<(), SessionError>>,
}

impl<S> ContextSessionClient<S>
where
    S: SessionClient + ?Sized,
{
    pub fn new(inner: Arc<S>, context: ThreadContext) -> Self {
        Self {
            inner,
            relay: OrderedRelay::new(context),
            state_wrappers: DashMap::new(),
            event_wrappers: DashMap::new(),
            connecting: Arc::new(SingleFlight::new()),
            closing: SingleFlight::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &ThreadContext {
        self.relay.context()
    }

    #[must_use]
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Submit an operation and run `callback` with its result on the
    /// dispatch context, after the callbacks of every earlier submission.
    pub fn submit<F>(&self, operation: PrimitiveOperation, callback: F)
    where
        F: FnOnce(Result<Bytes, SessionError>) + Send + 'static,
    {
        let pending = self.inner.execute(operation);
        self.relay_completion(pending, callback);
    }

    fn relay_completion<T, Fut, F>(&self, pending: Fut, callback: F)
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let ticket = self.relay.reserve();
        self.relay.context().handle().spawn(async move {
            let result = pending.await;
            ticket.complete(move || callback(result));
        });
    }

    /// Relay `pending` and expose its result once it has run on the context.
    ///
    /// Fails with a transport error when the context's runtime has stopped
    /// and the completion can no longer be delivered.
    fn ordered<T>(&self, pending: BoxFuture<'static, Result<T, SessionError>>) -> BoxFuture<'static, Result<T, SessionError>>
    where
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.relay_completion(pending, move |result| {
            let _ = tx.send(result);
        });
        async move {
            rx.await
                .unwrap_or_else(|_| Err(SessionError::Transport("dispatch context stopped".to_string())))
        }
        .boxed()
    }
}

impl<S> SessionClient for ContextSessionClient<S>
where
    S: SessionClient + ?Sized,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn primitive_type(&self) -> &str {
        self.inner.primitive_type()
    }

    fn status(&self) -> SessionStatus {
        self.inner.status()
    }

    fn session_id(&self) -> Option<SessionId> {
        self.inner.session_id()
    }

    fn connect(&self) -> BoxFuture<'static, Result<SessionId, SessionError>> {
        if self.inner.status() == SessionStatus::Closed {
            return future::ready(Err(SessionError::Closed)).boxed();
        }
        let connecting = self.connecting.clone();
        self.connecting
            .get_or_start(|| {
                let relayed = self.ordered(self.inner.connect());
                async move {
                    let result = relayed.await;
                    if result.is_err() {
                        connecting.clear();
                    }
                    result
                }
                .boxed()
            })
            .boxed()
    }

    fn execute(&self, operation: PrimitiveOperation) -> BoxFuture<'static, Result<Bytes, SessionError>> {
        self.ordered(self.inner.execute(operation))
    }

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>) {
        let context = self.relay.context().clone();
        self.state_wrappers.entry(listener.key()).or_insert_with(|| {
            let wrapper = Listener::new(move |state: PrimitiveState| {
                let listener = listener.clone();
                context.execute(move || listener.call(state));
            });
            self.inner.add_state_change_listener(wrapper.clone());
            wrapper
        });
    }

    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>) {
        if let Some((_, wrapper)) = self.state_wrappers.remove(&listener.key()) {
            self.inner.remove_state_change_listener(&wrapper);
        }
    }

    fn add_event_listener(&self, event_type: EventType, listener: Listener<PrimitiveEvent>) {
        let context = self.relay.context().clone();
        self.event_wrappers
            .entry((event_type.clone(), listener.key()))
            .or_insert_with(|| {
                let wrapper = Listener::new(move |event: PrimitiveEvent| {
                    let listener = listener.clone();
                    context.execute(move || listener.call(event));
                });
                self.inner.add_event_listener(event_type, wrapper.clone());
                wrapper
            });
    }

    fn remove_event_listener(&self, event_type: &EventType, listener: &Listener<PrimitiveEvent>) {
        if let Some((_, wrapper)) = self.event_wrappers.remove(&(event_type.clone(), listener.key())) {
            self.inner.remove_event_listener(event_type, &wrapper);
        }
    }

    fn close(&self) -> BoxFuture<'static, Result<(), SessionError>> {
        self.closing
            .get_or_start(|| self.ordered(self.inner.close()))
            .boxed()
    }
}

impl<S: ?Sized> std::fmt::Debug for ContextSessionClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSessionClient")
            .field("relay", &self.relay)
            .field("state_listeners", &self.state_wrappers.len())
            .field("event_listeners", &self.event_wrappers.len())
            .finish()
    }
}

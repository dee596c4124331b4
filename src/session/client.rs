//! Default session client.
//!
//! Owns the lifecycle state machine, the table of operations awaiting a
//! result and the task that pumps transport signals into listeners.

use super::single_flight::SingleFlight;
use super::transport::{OpenSession, SessionSignal, Transport};
use super::{SessionClient, SessionStatus};
use crate::config::{SessionConfig, SuspendPolicy};
use crate::error::{SessionError, TransportError};
use crate::metrics;
use crate::primitive::{EventType, PrimitiveEvent, PrimitiveOperation, PrimitiveState, SessionId};
use crate::telemetry::spans;
use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::{self, BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use replikit_cluster::{Listener, ListenerSet, Member, MembershipView};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

/// Base delay between resubmissions after transient unavailability.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

type Completion = oneshot::Sender<Result<Bytes, SessionError>>;

/// Session client talking directly to a [`Transport`].
///
/// Each operation is submitted from its own task as soon as `execute` is
/// called, so the client must be used from within a tokio runtime. Dropping
/// the returned future does not cancel the submission. Wrap it in [`crate::dispatch::ContextSessionClient`] for ordered delivery
/// on a dispatch context.
#[derive(Clone)]
pub struct DefaultSessionClient {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    primitive_type: String,
    client_id: Uuid,
    transport: Arc<dyn Transport>,
    membership: Arc<dyn MembershipView>,
    config: SessionConfig,
    status: watch::Sender<SessionStatus>,
    /// Why the session closed. Set together with the CLOSED transition.
    close_cause: OnceLock<SessionError>,
    session: RwLock<Option<SessionId>>,
    next_sequence: AtomicU64,
    pending: DashMap<u64, Completion>,
    state_listeners: ListenerSet<PrimitiveState>,
    event_listeners: DashMap<EventType, ListenerSet<PrimitiveEvent>>,
    connecting: SingleFlight<Result<SessionId, SessionError>>,
    closing: SingleFlight<Result<(), SessionError>>,
    target_cursor: AtomicUsize,
    suspend_epoch: AtomicU64,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl DefaultSessionClient {
    pub fn new(
        name: impl Into<String>,
        primitive_type: impl Into<String>,
        transport: Arc<dyn Transport>,
        membership: Arc<dyn MembershipView>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                primitive_type: primitive_type.into(),
                client_id: Uuid::new_v4(),
                transport,
                membership,
                config,
                status: watch::Sender::new(SessionStatus::Unconnected),
                close_cause: OnceLock::new(),
                session: RwLock::new(None),
                next_sequence: AtomicU64::new(0),
                pending: DashMap::new(),
                state_listeners: ListenerSet::new(),
                event_listeners: DashMap::new(),
                connecting: SingleFlight::new(),
                closing: SingleFlight::new(),
                target_cursor: AtomicUsize::new(0),
                suspend_epoch: AtomicU64::new(0),
                pump: Mutex::new(None),
            }),
        }
    }

    /// Operations submitted and not yet completed.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.inner.pending.len()
    }

    /// Wait until the status satisfies `predicate`.
    pub async fn wait_for(&self, predicate: impl Fn(SessionStatus) -> bool) -> SessionStatus {
        let mut rx = self.inner.status.subscribe();
        match rx.wait_for(|status| predicate(*status)).await {
            Ok(status) => *status,
            Err(_) => *self.inner.status.borrow(),
        }
    }
}

impl SessionClient for DefaultSessionClient {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn primitive_type(&self) -> &str {
        &self.inner.primitive_type
    }

    fn status(&self) -> SessionStatus {
        self.inner.status()
    }

    fn session_id(&self) -> Option<SessionId> {
        *self.inner.session.read()
    }

    fn connect(&self) -> BoxFuture<'static, Result<SessionId, SessionError>> {
        if self.inner.status() == SessionStatus::Closed {
            return future::ready(Err(SessionError::Closed)).boxed();
        }
        let inner = self.inner.clone();
        self.inner
            .connecting
            .get_or_start(move || inner.open().boxed())
            .boxed()
    }

    fn execute(&self, operation: PrimitiveOperation) -> BoxFuture<'static, Result<Bytes, SessionError>> {
        if self.inner.status() == SessionStatus::Closed {
            return future::ready(Err(SessionError::Closed)).boxed();
        }
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(sequence, tx);
        // A close that ran between the check above and the insert has already
        // drained the table.
        if self.inner.status() == SessionStatus::Closed {
            self.inner.pending.remove(&sequence);
            return future::ready(Err(self.inner.closed_error())).boxed();
        }

        let span = spans::operation(&self.inner.name, operation.id().as_str(), sequence);
        let inner = self.inner.clone();
        tokio::spawn(inner.execute(sequence, operation).instrument(span));
        async move {
            rx.await
                .unwrap_or_else(|_| Err(SessionError::Transport("operation task stopped".to_string())))
        }
        .boxed()
    }

    fn add_state_change_listener(&self, listener: Listener<PrimitiveState>) {
        self.inner.state_listeners.add(listener);
    }

    fn remove_state_change_listener(&self, listener: &Listener<PrimitiveState>) {
        self.inner.state_listeners.remove(&listener.key());
    }

    fn add_event_listener(&self, event_type: EventType, listener: Listener<PrimitiveEvent>) {
        self.inner
            .event_listeners
            .entry(event_type)
            .or_default()
            .add(listener);
    }

    fn remove_event_listener(&self, event_type: &EventType, listener: &Listener<PrimitiveEvent>) {
        if let Some(listeners) = self.inner.event_listeners.get(event_type) {
            listeners.remove(&listener.key());
        }
    }

    fn close(&self) -> BoxFuture<'static, Result<(), SessionError>> {
        let inner = self.inner.clone();
        self.inner
            .closing
            .get_or_start(move || {
                async move {
                    inner.shutdown().await;
                    Ok(())
                }
                .boxed()
            })
            .boxed()
    }
}

impl std::fmt::Debug for DefaultSessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultSessionClient")
            .field("name", &self.inner.name)
            .field("primitive_type", &self.inner.primitive_type)
            .field("status", &self.inner.status())
            .field("session", &*self.inner.session.read())
            .finish()
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

impl Inner {
    fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Move to `next` if the state machine allows it and notify listeners.
    fn transition(&self, next: SessionStatus) -> bool {
        self.transition_with(next, None)
    }

    fn transition_with(&self, next: SessionStatus, cause: Option<SessionError>) -> bool {
        let mut previous = next;
        let changed = self.status.send_if_modified(|status| {
            if !status.can_transition(next) {
                return false;
            }
            previous = *status;
            if let Some(cause) = cause {
                let _ = self.close_cause.set(cause);
            }
            *status = next;
            true
        });
        if changed {
            debug!(
                primitive = %self.name,
                from = previous.as_str(),
                to = next.as_str(),
                "session state transition"
            );
            metrics::record_transition(next.as_str());
            if let Some(state) = next.primitive_state() {
                self.state_listeners.notify(&state);
            }
        }
        changed
    }

    fn closed_error(&self) -> SessionError {
        self.close_cause.get().cloned().unwrap_or(SessionError::Closed)
    }

    /// Members to contact, ACTIVE first, rotating on every call.
    fn next_target(&self) -> Option<Member> {
        let mut members = self.membership.members();
        if members.is_empty() {
            return None;
        }
        members.sort_by_key(|member| (!member.is_active(), member.id()));
        let cursor = self.target_cursor.fetch_add(1, Ordering::Relaxed);
        members.get(cursor % members.len()).cloned()
    }

    async fn open(self: Arc<Self>) -> Result<SessionId, SessionError> {
        if !self.transition(SessionStatus::Connecting) {
            let err = match self.status() {
                SessionStatus::Closed => SessionError::Closed,
                _ => SessionError::NotConnected,
            };
            self.connecting.clear();
            return Err(err);
        }

        let span = spans::session(&self.name, &self.primitive_type);
        let mut attempts = 0;
        let outcome = loop {
            let request = OpenSession {
                client_id: self.client_id,
                name: self.name.clone(),
                primitive_type: self.primitive_type.clone(),
                target: self.next_target(),
            };
            match self.transport.open_session(request).instrument(span.clone()).await {
                Err(TransportError::Unavailable) if attempts < self.config.max_retries => {
                    attempts += 1;
                    debug!(primitive = %self.name, attempts, "cluster unavailable, trying next member");
                    tokio::time::sleep(RETRY_BACKOFF * attempts).await;
                }
                other => break other,
            }
        };

        let handle = match outcome {
            Ok(handle) => handle,
            Err(err) => {
                warn!(primitive = %self.name, error = %err, "failed to open session");
                self.transition(SessionStatus::Unconnected);
                self.connecting.clear();
                return Err(err.into());
            }
        };

        let id = handle.id;
        *self.session.write() = Some(id);
        let pump = tokio::spawn(Self::pump(Arc::downgrade(&self), handle.signals));
        *self.pump.lock() = Some(pump);

        if !self.transition(SessionStatus::Connected) {
            // Closed while the open request was in flight.
            if let Some(pump) = self.pump.lock().take() {
                pump.abort();
            }
            if let Err(err) = self.transport.close_session(id).await {
                debug!(primitive = %self.name, session = %id, error = %err, "release of abandoned session failed");
            }
            return Err(self.closed_error());
        }
        info!(primitive = %self.name, primitive_type = %self.primitive_type, session = %id, "session opened");
        Ok(id)
    }

    async fn shutdown(self: &Arc<Self>) {
        let session = *self.session.read();
        if !self.transition_with(SessionStatus::Closed, Some(SessionError::Closed)) {
            return;
        }
        self.fail_pending(SessionError::Closed);
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        let Some(id) = session else {
            return;
        };
        // Local resources are gone; releasing the server side is best-effort.
        match self.transport.close_session(id).await {
            Ok(()) => info!(primitive = %self.name, session = %id, "session closed"),
            Err(err) => warn!(
                primitive = %self.name,
                session = %id,
                error = %err,
                "server-side session release failed"
            ),
        }
    }

    fn expire(&self) {
        if !self.transition_with(SessionStatus::Closed, Some(SessionError::Expired)) {
            return;
        }
        let session = *self.session.read();
        warn!(primitive = %self.name, ?session, "session expired");
        self.fail_pending(SessionError::Expired);
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }

    fn suspend(self: &Arc<Self>) {
        if !self.transition(SessionStatus::Suspended) {
            return;
        }
        let epoch = self.suspend_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let timeout = self.config.expiry_timeout();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.status() == SessionStatus::Suspended
                && inner.suspend_epoch.load(Ordering::SeqCst) == epoch
            {
                warn!(primitive = %inner.name, ?timeout, "suspension exceeded expiry timeout");
                inner.expire();
            }
        });
    }

    fn recover(&self) {
        if self.transition(SessionStatus::Connected) {
            self.suspend_epoch.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fail_pending(&self, err: SessionError) {
        let sequences: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for sequence in sequences {
            if let Some((_, completion)) = self.pending.remove(&sequence) {
                let _ = completion.send(Err(err.clone()));
            }
        }
    }

    fn dispatch_event(&self, event: PrimitiveEvent) {
        let listeners = match self.event_listeners.get(event.event_type()) {
            Some(listeners) => listeners.snapshot(),
            None => return,
        };
        for listener in listeners {
            listener.call(event.clone());
        }
    }

    async fn pump(weak: Weak<Self>, mut signals: mpsc::UnboundedReceiver<SessionSignal>) {
        while let Some(signal) = signals.recv().await {
            let Some(inner) = weak.upgrade() else {
                break;
            };
            match signal {
                SessionSignal::Event(event) => inner.dispatch_event(event),
                SessionSignal::Suspended => inner.suspend(),
                SessionSignal::Recovered => inner.recover(),
                SessionSignal::Expired => {
                    inner.expire();
                    break;
                }
            }
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

impl Inner {
    /// Wait until the session can accept operations.
    async fn await_connected(&self) -> Result<SessionId, SessionError> {
        let mut rx = self.status.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            match status {
                SessionStatus::Connected => {
                    return (*self.session.read()).ok_or(SessionError::NotConnected);
                }
                SessionStatus::Suspended if self.config.suspend_policy == SuspendPolicy::FailFast => {
                    return Err(SessionError::Suspended);
                }
                SessionStatus::Unconnected => return Err(SessionError::NotConnected),
                SessionStatus::Closed => return Err(self.closed_error()),
                SessionStatus::Connecting | SessionStatus::Suspended => {}
            }
            if rx.changed().await.is_err() {
                return Err(self.closed_error());
            }
        }
    }

    /// Drive one operation to completion and resolve its pending entry.
    ///
    /// Stops early once the session closes; closing already failed the entry.
    async fn execute(self: Arc<Self>, sequence: u64, operation: PrimitiveOperation) {
        let mut status = self.status.subscribe();
        let result = tokio::select! {
            biased;
            _ = async {
                let _ = status.wait_for(|status| *status == SessionStatus::Closed).await;
            } => return,
            result = async {
                let session = self.await_connected().await?;
                self.submit(session, sequence, operation).await
            } => result,
        };
        if let Some((_, completion)) = self.pending.remove(&sequence) {
            let _ = completion.send(result);
        }
    }

    async fn submit(&self, mut session: SessionId, sequence: u64, operation: PrimitiveOperation) -> Result<Bytes, SessionError> {
        let mut attempts = 0;
        loop {
            match self.transport.submit(session, sequence, operation.clone()).await {
                Ok(result) => return Ok(result),
                Err(TransportError::Unavailable) if attempts < self.config.max_retries => {
                    attempts += 1;
                    debug!(primitive = %self.name, sequence, attempts, "cluster unavailable, resubmitting");
                    tokio::time::sleep(RETRY_BACKOFF * attempts).await;
                    session = self.await_connected().await?;
                }
                Err(TransportError::UnknownSession) => {
                    self.expire();
                    return Err(SessionError::Expired);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

//! In-process replica transport.
//!
//! Hosts one replicated service per primitive name, applies operations
//! serially with a monotonically increasing commit index and fans published
//! events out to every session open on the primitive. Fault injection
//! (suspension, recovery, expiry) makes it usable as a test double for a
//! real cluster.

use crate::error::TransportError;
use crate::primitive::{
    Commit, PrimitiveOperation, PrimitiveTypeRegistry, ReplicatedService, ServiceConfig, SessionId,
};
use crate::session::{OpenSession, SessionHandle, SessionSignal, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

struct Replica {
    primitive_type: String,
    service: Box<dyn ReplicatedService>,
    index: u64,
}

struct SessionEntry {
    name: String,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

/// A single-process stand-in for the replicated cluster.
pub struct LocalTransport {
    registry: Arc<PrimitiveTypeRegistry>,
    replicas: DashMap<String, Arc<Mutex<Replica>>>,
    sessions: DashMap<SessionId, SessionEntry>,
    next_session: AtomicU64,
    available: AtomicBool,
}

impl LocalTransport {
    pub fn new(registry: Arc<PrimitiveTypeRegistry>) -> Self {
        Self {
            registry,
            replicas: DashMap::new(),
            sessions: DashMap::new(),
            next_session: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Number of open sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Last commit index applied to the primitive `name`.
    pub fn commit_index(&self, name: &str) -> Option<u64> {
        self.replicas.get(name).map(|replica| replica.lock().index)
    }

    /// Snapshot of the service behind the primitive `name`.
    pub fn snapshot(&self, name: &str) -> Option<Result<Bytes, TransportError>> {
        let replica = self.replicas.get(name)?.value().clone();
        let snapshot = replica.lock().service.snapshot();
        Some(snapshot.map_err(|err| TransportError::Rejected(err.0)))
    }

    /// Lose contact with the cluster: every session is suspended and
    /// requests fail with [`TransportError::Unavailable`].
    pub fn suspend_all(&self) {
        self.available.store(false, Ordering::SeqCst);
        info!("local transport suspended");
        self.broadcast(SessionSignal::Suspended);
    }

    /// Restore contact; every session recovers.
    pub fn recover_all(&self) {
        self.available.store(true, Ordering::SeqCst);
        info!("local transport recovered");
        self.broadcast(SessionSignal::Recovered);
    }

    /// Forget a session as if the cluster had expired it.
    pub fn expire_session(&self, session: SessionId) -> bool {
        let Some((_, entry)) = self.sessions.remove(&session) else {
            return false;
        };
        info!(%session, primitive = %entry.name, "expiring session");
        self.release(&entry.name, session);
        let _ = entry.signals.send(SessionSignal::Expired);
        true
    }

    fn broadcast(&self, signal: SessionSignal) {
        for entry in self.sessions.iter() {
            let _ = entry.signals.send(signal.clone());
        }
    }

    fn release(&self, name: &str, session: SessionId) {
        if let Some(replica) = self.replicas.get(name).map(|replica| replica.value().clone()) {
            replica.lock().service.on_session_close(session);
        }
    }

    fn ensure_available(&self) -> Result<(), TransportError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Unavailable)
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn open_session(&self, request: OpenSession) -> Result<SessionHandle, TransportError> {
        self.ensure_available()?;
        let primitive_type = self
            .registry
            .get(&request.primitive_type)
            .ok_or_else(|| TransportError::Rejected(format!("unknown primitive type: {}", request.primitive_type)))?;

        let replica = self
            .replicas
            .entry(request.name.clone())
            .or_insert_with(|| {
                debug!(primitive = %request.name, primitive_type = %request.primitive_type, "creating replica");
                Arc::new(Mutex::new(Replica {
                    primitive_type: request.primitive_type.clone(),
                    service: primitive_type.new_service(&ServiceConfig::new(request.name.clone())),
                    index: 0,
                }))
            })
            .value()
            .clone();
        let existing_type = replica.lock().primitive_type.clone();
        if existing_type != request.primitive_type {
            return Err(TransportError::Rejected(format!(
                "{} is a {existing_type}, not a {}",
                request.name, request.primitive_type
            )));
        }

        let id = SessionId::new(self.next_session.fetch_add(1, Ordering::Relaxed));
        let (signals, receiver) = mpsc::unbounded_channel();
        self.sessions.insert(
            id,
            SessionEntry {
                name: request.name.clone(),
                signals,
            },
        );
        debug!(session = %id, primitive = %request.name, client = %request.client_id, "session opened");
        Ok(SessionHandle { id, signals: receiver })
    }

    async fn submit(
        &self,
        session: SessionId,
        sequence: u64,
        operation: PrimitiveOperation,
    ) -> Result<Bytes, TransportError> {
        self.ensure_available()?;
        let name = self
            .sessions
            .get(&session)
            .map(|entry| entry.name.clone())
            .ok_or(TransportError::UnknownSession)?;
        let replica = self
            .replicas
            .get(&name)
            .map(|replica| replica.value().clone())
            .ok_or(TransportError::UnknownSession)?;

        let mut replica = replica.lock();
        replica.index += 1;
        let mut commit = Commit::new(replica.index, session, operation, Utc::now().timestamp_millis().max(0) as u64);
        trace!(%session, sequence, index = commit.index(), "applying operation");
        let result = replica.service.apply(&mut commit);

        // Fan out under the replica lock so every session sees events in commit order.
        for event in commit.into_events() {
            for entry in self.sessions.iter().filter(|entry| entry.name == name) {
                let _ = entry.signals.send(SessionSignal::Event(event.clone()));
            }
        }
        result.map_err(|err| TransportError::Rejected(err.0))
    }

    async fn close_session(&self, session: SessionId) -> Result<(), TransportError> {
        self.ensure_available()?;
        let (_, entry) = self
            .sessions
            .remove(&session)
            .ok_or(TransportError::UnknownSession)?;
        self.release(&entry.name, session);
        debug!(%session, primitive = %entry.name, "session released");
        Ok(())
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("replicas", &self.replicas.len())
            .field("sessions", &self.sessions.len())
            .field("available", &self.available.load(Ordering::SeqCst))
            .finish()
    }
}

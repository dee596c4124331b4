//! Scripted transport.
//!
//! Submissions can be held and released individually so tests control the
//! order in which completions arrive. Opens can be gated the same way.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use replikit::TransportError;
use replikit::primitive::{PrimitiveOperation, SessionId};
use replikit::session::{OpenSession, SessionHandle, SessionSignal, Transport};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot, watch};

type Reply = oneshot::Sender<Result<Bytes, TransportError>>;

pub struct ScriptedTransport {
    opens: AtomicUsize,
    closes: AtomicUsize,
    next_session: AtomicU64,
    fail_next_open: AtomicBool,
    hold_submissions: AtomicBool,
    opens_released: watch::Sender<bool>,
    held: Mutex<BTreeMap<u64, Reply>>,
    held_count: watch::Sender<usize>,
    signals: Mutex<Vec<mpsc::UnboundedSender<SessionSignal>>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            next_session: AtomicU64::new(100),
            fail_next_open: AtomicBool::new(false),
            hold_submissions: AtomicBool::new(false),
            opens_released: watch::Sender::new(true),
            held: Mutex::new(BTreeMap::new()),
            held_count: watch::Sender::new(0),
            signals: Mutex::new(Vec::new()),
        }
    }

    /// Hold every submission until released.
    pub fn holding() -> Self {
        let transport = Self::new();
        transport.hold_submissions.store(true, Ordering::SeqCst);
        transport
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }

    pub fn hold_opens(&self) {
        self.opens_released.send_replace(false);
    }

    pub fn release_opens(&self) {
        self.opens_released.send_replace(true);
    }

    /// Wait until at least `count` submissions are held.
    pub async fn wait_held(&self, count: usize) {
        let mut rx = self.held_count.subscribe();
        rx.wait_for(|held| *held >= count).await.expect("held count");
    }

    /// Sequence numbers of held submissions, ascending.
    pub fn held_sequences(&self) -> Vec<u64> {
        self.held.lock().keys().copied().collect()
    }

    /// Complete the held submission with `sequence`.
    pub fn release(&self, sequence: u64, result: Result<Bytes, TransportError>) -> bool {
        let reply = self.held.lock().remove(&sequence);
        match reply {
            Some(reply) => {
                self.held_count.send_modify(|held| *held -= 1);
                reply.send(result).is_ok()
            }
            None => false,
        }
    }

    /// Push a signal to every open session.
    pub fn signal(&self, signal: SessionSignal) {
        for sender in self.signals.lock().iter() {
            let _ = sender.send(signal.clone());
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open_session(&self, _request: OpenSession) -> Result<SessionHandle, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut released = self.opens_released.subscribe();
        released.wait_for(|released| *released).await.map_err(|e| TransportError::Io(e.to_string()))?;
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Rejected("no leader".to_string()));
        }
        let id = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel();
        self.signals.lock().push(tx);
        Ok(SessionHandle { id, signals: rx })
    }

    async fn submit(&self, _session: SessionId, sequence: u64, operation: PrimitiveOperation) -> Result<Bytes, TransportError> {
        if !self.hold_submissions.load(Ordering::SeqCst) {
            return Ok(operation.args().clone());
        }
        let (tx, rx) = oneshot::channel();
        self.held.lock().insert(sequence, tx);
        self.held_count.send_modify(|held| *held += 1);
        rx.await.unwrap_or(Err(TransportError::Unavailable))
    }

    async fn close_session(&self, _session: SessionId) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

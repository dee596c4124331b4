//! Transport contract between the session client and the cluster.

use crate::error::TransportError;
use crate::primitive::{PrimitiveEvent, PrimitiveOperation, SessionId};
use async_trait::async_trait;
use bytes::Bytes;
use replikit_cluster::Member;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Request to open a session on a named primitive.
#[derive(Debug, Clone)]
pub struct OpenSession {
    /// Identity of the client process issuing the request.
    pub client_id: Uuid,
    pub name: String,
    pub primitive_type: String,
    /// Member to contact first. `None` lets the transport choose.
    pub target: Option<Member>,
}

/// Unsolicited notifications from the transport about one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// An event published by the replicated service.
    Event(PrimitiveEvent),
    /// Contact with the cluster was lost without confirmed session loss.
    Suspended,
    /// Contact was re-established and the session is still known.
    Recovered,
    /// The cluster confirmed that the session no longer exists.
    Expired,
}

/// An open session and its signal stream.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    pub signals: mpsc::UnboundedReceiver<SessionSignal>,
}

/// Carries operations to the replicated service and signals back.
///
/// Implementations may complete concurrent submissions in any order.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open_session(&self, request: OpenSession) -> Result<SessionHandle, TransportError>;

    /// Submit one operation. `sequence` is unique per session and increases
    /// in the order operations were issued. Concurrent submissions may arrive
    /// out of sequence order.
    async fn submit(
        &self,
        session: SessionId,
        sequence: u64,
        operation: PrimitiveOperation,
    ) -> Result<Bytes, TransportError>;

    async fn close_session(&self, session: SessionId) -> Result<(), TransportError>;
}

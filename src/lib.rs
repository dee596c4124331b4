//! replikit - client runtime for replicated data primitives.
//!
//! Opens ordered sessions to replicated state machines, delivers operation
//! completions and pushed events on a sequential dispatch context, and layers
//! optional read caching and a blocking facade on top.
//!
//! # Architecture
//!
//! ```text
//! application
//!     │
//!     ▼
//! BlockingAtomicMultimap ─── Blocking (timeout, caller thread)
//!     │
//!     ▼
//! CachingAsyncMultimap ───── ReadCache (moka, epoch-gated fills)
//!     │
//!     ▼
//! MultimapProxy ──────────── Serializer (namespaced msgpack)
//!     │
//!     ▼
//! ContextSessionClient ───── OrderedRelay ──▶ ThreadContext
//!     │
//!     ▼
//! DefaultSessionClient ───── lifecycle, pending table, signal pump
//!     │
//!     ▼
//! Transport ──▶ replicated service (LocalTransport in-process)
//! ```
//!
//! The atomic set stacks the same way (`BlockingAtomicSet`,
//! `CachingAsyncSet`, `SetProxy`). The atomic counter has no cache layer.

pub mod blocking;
pub mod cache;
pub mod config;
pub mod counter;
pub mod dispatch;
pub mod error;
pub mod local;
pub mod metrics;
pub mod multimap;
pub mod primitive;
pub mod session;
pub mod set;
pub mod telemetry;

pub use blocking::Blocking;
pub use cache::ReadCache;
pub use config::Config;
pub use counter::{AsyncAtomicCounter, AtomicCounterType, BlockingAtomicCounter};
pub use dispatch::{ContextSessionClient, ThreadContext, ThreadContextFactory};
pub use error::{CommandError, PrimitiveError, PrimitiveResult, SessionError, TransportError};
pub use local::LocalTransport;
pub use multimap::{
    AsyncAtomicMultimap, AsyncMultimapRead, AsyncMultimapWrite, AtomicMultimapType, BlockingAtomicMultimap,
    CachingAsyncMultimap, MultimapEvent,
};
pub use primitive::{
    PrimitiveEvent, PrimitiveManagementService, PrimitiveOperation, PrimitiveState, PrimitiveType,
    PrimitiveTypeRegistry, Versioned,
};
pub use session::{DefaultSessionClient, SessionClient, SessionStatus, Transport};
pub use set::{
    AsyncAtomicSet, AsyncNavigableSet, AsyncSetRead, AsyncSetWrite, AtomicSetType, BlockingAtomicSet, CachingAsyncSet,
    SetElement, SetEvent,
};

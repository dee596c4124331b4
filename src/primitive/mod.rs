//! Primitive core: value types, the replicated service contract, the type
//! registry and the management service builders draw on.

mod management;
mod proxy;
mod registry;
mod service;
mod types;

pub use management::PrimitiveManagementService;
pub use proxy::{PrimitiveProxy, PrimitiveValue, client_serializer, ensure_registered};
pub use registry::{PrimitiveBuilderFactory, PrimitiveType, PrimitiveTypeRegistry};
pub use service::{Commit, ReplicatedService, ServiceConfig};
pub use types::{
    EventType, OperationId, PrimitiveEvent, PrimitiveOperation, PrimitiveState, SessionId, Versioned,
};

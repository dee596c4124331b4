//! Thread-context dispatch.
//!
//! - [`context`]: sequential execution contexts and their factory
//! - [`relay`]: reorder buffer releasing completions in submission order
//! - [`client`]: the session client decorator built from the two

mod client;
mod context;
mod relay;

pub use client::ContextSessionClient;
pub use context::{Job, ThreadContext, ThreadContextFactory};
pub use relay::{OrderedRelay, Ticket};

//! Error types for membership and serialization.

use crate::member::MemberId;
use thiserror::Error;

/// Errors raised while encoding or decoding namespaced values.
#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("type {0} is not registered in the namespace")]
    Unregistered(&'static str),

    #[error("type id mismatch: expected {expected}, found id {found}")]
    TypeMismatch { expected: &'static str, found: u16 },

    #[error("payload too short to carry a type id")]
    Truncated,

    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Errors raised while building or operating a membership view.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("local member id is required")]
    MissingMemberId,

    #[error("local member address is required")]
    MissingAddress,

    #[error("seed member {0} is listed more than once")]
    DuplicateSeed(MemberId),

    #[error("member {0} is unreachable")]
    Unreachable(MemberId),

    #[error("serializer error: {0}")]
    Serializer(#[from] SerializerError),
}

//! Error taxonomy shared by the host and client halves.

use syncproxy_shared_memory::SharedMemoryError;
use thiserror::Error;

use crate::message::{Failure, ObjectId, OperationError};

/// Errors surfaced by proxy operations.
///
/// Structural and protocol errors are fatal to the session
/// (see [`is_fatal`](Self::is_fatal)); operation-level errors are ordinary
/// failures of the corresponding remote call.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// An id the registry never issued: host and worker have desynchronised.
    #[error("unknown object id: {0}")]
    UnknownObjectId(ObjectId),

    /// A blocking payload did not fit in the data region.
    #[error("payload of {size} bytes exceeds data region capacity of {capacity} bytes")]
    PayloadTooLarge { size: usize, capacity: usize },

    /// The reflected operation itself failed.
    #[error("operation failed: {0}")]
    OperationFailed(OperationError),

    /// A blocking round trip is already outstanding on this channel.
    #[error("a blocking request is already outstanding")]
    ChannelBusy,

    /// The message port has been closed by the other side.
    #[error("message channel closed")]
    ChannelClosed,

    /// A message or payload made no sense in context.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Any other shared memory failure.
    #[error("shared memory error: {0}")]
    SharedMemory(SharedMemoryError),
}

impl ProxyError {
    /// Whether the error means the session can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        match self {
            ProxyError::UnknownObjectId(_)
            | ProxyError::ChannelClosed
            | ProxyError::Protocol(_)
            | ProxyError::Codec(_)
            | ProxyError::SharedMemory(_) => true,
            ProxyError::PayloadTooLarge { .. }
            | ProxyError::OperationFailed(_)
            | ProxyError::ChannelBusy => false,
        }
    }

    /// The envelope to send across the boundary for this error.
    pub fn to_failure(&self) -> Failure {
        match self {
            ProxyError::UnknownObjectId(id) => Failure::UnknownObjectId { id: id.clone() },
            ProxyError::PayloadTooLarge { size, capacity } => Failure::PayloadTooLarge {
                size: *size,
                capacity: *capacity,
            },
            ProxyError::OperationFailed(error) => Failure::Operation {
                error: error.clone(),
            },
            other => Failure::Protocol {
                message: other.to_string(),
            },
        }
    }
}

impl From<SharedMemoryError> for ProxyError {
    fn from(e: SharedMemoryError) -> Self {
        match e {
            SharedMemoryError::PayloadTooLarge { size, capacity } => {
                ProxyError::PayloadTooLarge { size, capacity }
            }
            SharedMemoryError::ChannelBusy => ProxyError::ChannelBusy,
            other => ProxyError::SharedMemory(other),
        }
    }
}

impl From<OperationError> for ProxyError {
    fn from(e: OperationError) -> Self {
        ProxyError::OperationFailed(e)
    }
}

impl From<Failure> for ProxyError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Operation { error } => ProxyError::OperationFailed(error),
            Failure::UnknownObjectId { id } => ProxyError::UnknownObjectId(id),
            Failure::PayloadTooLarge { size, capacity } => {
                ProxyError::PayloadTooLarge { size, capacity }
            }
            Failure::Protocol { message } => ProxyError::Protocol(message),
        }
    }
}

/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_memory_errors_map_to_taxonomy() {
        let e: ProxyError = SharedMemoryError::PayloadTooLarge {
            size: 10,
            capacity: 4,
        }
        .into();
        assert!(matches!(e, ProxyError::PayloadTooLarge { size: 10, capacity: 4 }));
        assert!(!e.is_fatal());

        let e: ProxyError = SharedMemoryError::ChannelBusy.into();
        assert!(matches!(e, ProxyError::ChannelBusy));

        let e: ProxyError = SharedMemoryError::Corrupt {
            claimed: 9,
            available: 1,
        }
        .into();
        assert!(e.is_fatal());
    }

    #[test]
    fn failures_round_trip_through_errors() {
        let failure = Failure::Operation {
            error: OperationError::type_error("boom"),
        };
        let e = ProxyError::from(failure.clone());
        assert!(matches!(e, ProxyError::OperationFailed(_)));
        assert_eq!(e.to_failure(), failure);
    }

    #[test]
    fn unknown_id_is_fatal() {
        let e = ProxyError::UnknownObjectId(ObjectId::from_string("x"));
        assert!(e.is_fatal());
        assert_eq!(e.to_string(), "unknown object id: x");
    }

    #[test]
    fn channel_closed_becomes_protocol_failure() {
        let failure = ProxyError::ChannelClosed.to_failure();
        assert_eq!(
            failure,
            Failure::Protocol {
                message: "message channel closed".to_string()
            }
        );
    }
}

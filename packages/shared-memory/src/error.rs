//! Error types for the shared memory layer.

use thiserror::Error;

use crate::lock::LockState;

/// Errors that can occur while using the shared regions.
///
/// These are transport-level errors only. Failures of the operation carried
/// inside a payload belong in higher layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharedMemoryError {
    /// The encoded payload does not fit in the data region.
    #[error("payload of {size} bytes exceeds data region capacity of {capacity} bytes")]
    PayloadTooLarge { size: usize, capacity: usize },

    /// A blocking round trip is already outstanding on this channel.
    #[error("a blocking request is already outstanding on this channel")]
    ChannelBusy,

    /// The lock word was not in the state the operation requires.
    #[error("lock word is {found}, expected {expected}")]
    UnexpectedState { expected: LockState, found: LockState },

    /// The data region header describes more bytes than the region holds.
    #[error("data region header claims {claimed} bytes but only {available} are available")]
    Corrupt { claimed: usize, available: usize },
}

/// Result type alias for shared memory operations.
pub type Result<T> = std::result::Result<T, SharedMemoryError>;

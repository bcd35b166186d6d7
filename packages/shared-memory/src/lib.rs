//! Shared memory signaling for cross-context blocking calls.
//!
//! This is the narrow waist of the syncproxy stack. Everything at this level
//! is pure bytes - no object ids, no reflect operations, no value semantics.
//!
//! A [`SharedChannel`] is built from three fixed regions that both contexts
//! can reach:
//!
//! - the **lock** region holds the control word (`idle`, `request-pending`,
//!   `response-ready`) and the wait/notify signal,
//! - the **data** region holds the length-prefixed payload of the single
//!   in-flight blocking round trip,
//! - the **interrupt** region holds one advisory flag that the host may set at
//!   any time and the worker's runtime polls between operations.
//!
//! # Example
//!
//! ```rust
//! use std::thread;
//! use syncproxy_shared_memory::{SharedChannel, SharedChannelConfig, SharedMemoryError};
//!
//! let channel = SharedChannel::new(SharedChannelConfig::default());
//! let host = channel.clone();
//!
//! let response = channel
//!     .request_sync(b"ping", || {
//!         // In a real session the doorbell posts a message to the host.
//!         thread::spawn(move || host.respond(b"pong"));
//!         Ok::<(), SharedMemoryError>(())
//!     })
//!     .unwrap();
//! assert_eq!(response, b"pong");
//! ```

mod channel;
mod config;
mod data;
mod error;
mod interrupt;
mod lock;

pub use channel::{SharedBuffers, SharedChannel};
pub use config::SharedChannelConfig;
pub use data::{DataRegion, HEADER_LEN};
pub use error::{Result, SharedMemoryError};
pub use interrupt::{InterruptFlag, SIGINT};
pub use lock::{LockRegion, LockState};

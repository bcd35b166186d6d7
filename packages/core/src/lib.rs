//! Core syncproxy: the shared vocabulary of host and worker.
//!
//! This layer gives meaning to the bytes moved by `syncproxy-shared-memory`:
//! - `Value`: plain data that crosses the boundary by copy
//! - `PropertyKey`: one step of a property path (a name or a symbol)
//! - `ProxyMessage`: the tagged protocol exchanged over the message port
//! - `WireValue`: a `Value` or a remote-reference envelope
//! - `ProxyError`: the error taxonomy shared by both halves
//!
//! Nothing here knows how objects are stored or how messages are carried;
//! the host and client halves live in `syncproxy-object-proxy`.
//!
//! # Example
//!
//! ```rust
//! use syncproxy_core::{codec, ObjectId, ProxyMessage, ReflectRequest, path};
//!
//! let id = ObjectId::new();
//! let message = ProxyMessage::Reflect {
//!     request_id: 7,
//!     request: ReflectRequest::get(id, path!["length"]),
//! };
//!
//! let bytes = codec::encode(&message).unwrap();
//! let decoded: ProxyMessage = codec::decode(&bytes).unwrap();
//! assert_eq!(decoded, message);
//! ```

pub mod codec;
mod convert;
mod error;
mod key;
mod message;
mod value;

pub use convert::{from_value, json_to_value, to_value, value_to_json};
pub use error::{ProxyError, Result};
pub use key::{display_path, PropertyKey};
pub use message::{
    Failure, ObjectId, OperationError, Outcome, PromiseState, ProxyMessage, ReflectOp,
    ReflectRequest, RemoteKind, RemoteRef, RequestId, WireValue,
};
pub use value::Value;

// Re-export the transport error so callers matching on `ProxyError` need
// only this crate.
pub use syncproxy_shared_memory::SharedMemoryError;

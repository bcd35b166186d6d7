//! The proxy message protocol.
//!
//! Every message carries a `type` discriminator. `reflect`, `shared_memory`
//! and `print_object` travel worker -> host; `reply` and `promise` travel
//! host -> worker.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{display_path, PropertyKey, Value};

/// Opaque token identifying one live host value for a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Mint a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an id received from elsewhere (a handshake, a config file).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlates a `reflect` or `print_object` request with its `reply`.
pub type RequestId = u64;

/// The structural verb applied at the end of a property path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectOp {
    Get,
    Set,
    Has,
    DeleteProperty,
    OwnKeys,
    Apply,
    Construct,
}

impl fmt::Display for ReflectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReflectOp::Get => "get",
            ReflectOp::Set => "set",
            ReflectOp::Has => "has",
            ReflectOp::DeleteProperty => "deleteProperty",
            ReflectOp::OwnKeys => "ownKeys",
            ReflectOp::Apply => "apply",
            ReflectOp::Construct => "construct",
        };
        f.write_str(name)
    }
}

/// A structural operation on a proxied object.
///
/// For `get`, `set`, `has` and `delete_property` the last path element is
/// the property operated on. For `own_keys`, `apply` and `construct` the
/// whole path leads to the target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReflectRequest {
    /// Root object the path starts from.
    pub id: ObjectId,
    /// Property accesses leading to the target.
    pub path: Vec<PropertyKey>,
    /// The verb.
    pub op: ReflectOp,
    /// Arguments for `apply` and `construct`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<WireValue>,
    /// New value for `set`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<WireValue>,
}

impl ReflectRequest {
    fn new(id: ObjectId, path: Vec<PropertyKey>, op: ReflectOp) -> Self {
        Self {
            id,
            path,
            op,
            args: Vec::new(),
            value: None,
        }
    }

    pub fn get(id: ObjectId, path: Vec<PropertyKey>) -> Self {
        Self::new(id, path, ReflectOp::Get)
    }

    pub fn set(id: ObjectId, path: Vec<PropertyKey>, value: WireValue) -> Self {
        Self {
            value: Some(value),
            ..Self::new(id, path, ReflectOp::Set)
        }
    }

    pub fn has(id: ObjectId, path: Vec<PropertyKey>) -> Self {
        Self::new(id, path, ReflectOp::Has)
    }

    pub fn delete_property(id: ObjectId, path: Vec<PropertyKey>) -> Self {
        Self::new(id, path, ReflectOp::DeleteProperty)
    }

    pub fn own_keys(id: ObjectId, path: Vec<PropertyKey>) -> Self {
        Self::new(id, path, ReflectOp::OwnKeys)
    }

    pub fn apply(id: ObjectId, path: Vec<PropertyKey>, args: Vec<WireValue>) -> Self {
        Self {
            args,
            ..Self::new(id, path, ReflectOp::Apply)
        }
    }

    pub fn construct(id: ObjectId, path: Vec<PropertyKey>, args: Vec<WireValue>) -> Self {
        Self {
            args,
            ..Self::new(id, path, ReflectOp::Construct)
        }
    }
}

impl fmt::Display for ReflectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.op, self.id, display_path(&self.path))
    }
}

/// What kind of host value a remote reference stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKind {
    Object,
    Function,
    Promise,
}

/// The "this is a remote reference" envelope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRef {
    pub id: ObjectId,
    pub kind: RemoteKind,
}

/// A value as it crosses the boundary: plain data by copy, anything else
/// by reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum WireValue {
    Data(Value),
    Remote(RemoteRef),
}

impl WireValue {
    /// The plain data, if this is not a reference.
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            WireValue::Data(value) => Some(value),
            WireValue::Remote(_) => None,
        }
    }

    /// The reference, if this is one.
    pub fn as_remote(&self) -> Option<&RemoteRef> {
        match self {
            WireValue::Remote(remote) => Some(remote),
            WireValue::Data(_) => None,
        }
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        WireValue::Data(value)
    }
}

impl From<RemoteRef> for WireValue {
    fn from(remote: RemoteRef) -> Self {
        WireValue::Remote(remote)
    }
}

/// Settlement state of a promise forwarded from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

/// A failure raised by the reflected operation itself.
///
/// Carries the same two fields a thrown error would: a class-like `name`
/// (`TypeError`, `NotFound`, ...) and a human readable `message`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[error("{name}: {message}")]
pub struct OperationError {
    pub name: String,
    pub message: String,
}

impl OperationError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new("RangeError", message)
    }

    /// Generic error for failures without a more specific class.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }
}

/// Structured failure envelope carried in replies.
///
/// This is the serialisable mirror of the non-local
/// [`ProxyError`](crate::ProxyError) variants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum Failure {
    /// The operation itself failed; not fatal.
    Operation { error: OperationError },
    /// The request named an id the registry never issued.
    UnknownObjectId { id: ObjectId },
    /// The response could not fit in the data region.
    PayloadTooLarge { size: usize, capacity: usize },
    /// The host could not make sense of the request.
    Protocol { message: String },
}

impl From<OperationError> for Failure {
    fn from(error: OperationError) -> Self {
        Failure::Operation { error }
    }
}

/// Result of one reflected operation.
pub type Outcome = std::result::Result<WireValue, Failure>;

/// A message exchanged between host and worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyMessage {
    /// Worker -> host: perform an operation, answer with a `reply`.
    Reflect {
        request_id: RequestId,
        request: ReflectRequest,
    },
    /// Worker -> host: perform an operation, answer through the shared
    /// data region. The worker is parked until the answer arrives.
    SharedMemory { request: ReflectRequest },
    /// Worker -> host: describe an object for debugging. Never fails.
    PrintObject {
        request_id: RequestId,
        id: ObjectId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        path: Vec<PropertyKey>,
    },
    /// Host -> worker: answer to `reflect` or `print_object`.
    Reply {
        request_id: RequestId,
        outcome: Outcome,
    },
    /// Host -> worker: a previously returned promise settled.
    Promise {
        id: ObjectId,
        state: PromiseState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<WireValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<OperationError>,
    },
}

impl ProxyMessage {
    /// The `type` discriminator, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyMessage::Reflect { .. } => "reflect",
            ProxyMessage::SharedMemory { .. } => "shared_memory",
            ProxyMessage::PrintObject { .. } => "print_object",
            ProxyMessage::Reply { .. } => "reply",
            ProxyMessage::Promise { .. } => "promise",
        }
    }

    /// The object a message concerns, if any.
    pub fn object_id(&self) -> Option<&ObjectId> {
        match self {
            ProxyMessage::Reflect { request, .. } | ProxyMessage::SharedMemory { request } => {
                Some(&request.id)
            }
            ProxyMessage::PrintObject { id, .. } | ProxyMessage::Promise { id, .. } => Some(id),
            ProxyMessage::Reply { .. } => None,
        }
    }
}

//! Remote object handles and the values operations return.

use std::fmt;

use serde::de::DeserializeOwned;

use syncproxy_core::{
    display_path, from_value, ObjectId, OperationError, PropertyKey, ProxyError, ReflectRequest,
    RemoteKind, RemoteRef, Result, Value, WireValue,
};

use super::{Deferred, ProxyClient};

/// A handle to a host object, optionally narrowed to a property path.
///
/// Property syntax cannot be intercepted, so every interaction goes through
/// a method. [`prop`](Self::prop) only extends the path locally; the verbs
/// return a [`Deferred`] that performs the round trip when awaited or passed
/// to [`ProxyClient::then_sync`].
#[derive(Clone)]
pub struct ObjectProxy {
    client: ProxyClient,
    id: ObjectId,
    kind: RemoteKind,
    path: Vec<PropertyKey>,
}

impl ObjectProxy {
    pub(crate) fn new(client: ProxyClient, id: ObjectId, kind: RemoteKind) -> Self {
        Self {
            client,
            id,
            kind,
            path: Vec::new(),
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Kind of the root object this handle was created from.
    pub fn kind(&self) -> RemoteKind {
        self.kind
    }

    pub fn path(&self) -> &[PropertyKey] {
        &self.path
    }

    pub fn client(&self) -> &ProxyClient {
        &self.client
    }

    /// A handle one property further down. No message is sent.
    pub fn prop(&self, key: impl Into<PropertyKey>) -> ObjectProxy {
        let mut path = self.path.clone();
        path.push(key.into());
        Self { path, ..self.clone() }
    }

    /// The reference to pass as an argument, if this handle is not
    /// narrowed to a property.
    pub fn reference(&self) -> Option<RemoteRef> {
        self.path.is_empty().then(|| RemoteRef {
            id: self.id.clone(),
            kind: self.kind,
        })
    }

    /// Read the value this handle points at.
    pub fn value(&self) -> Deferred {
        self.deferred(ReflectRequest::get(self.id.clone(), self.path.clone()))
    }

    pub fn get(&self, key: impl Into<PropertyKey>) -> Deferred {
        self.prop(key).value()
    }

    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<WireValue>) -> Deferred {
        let request = ReflectRequest::set(self.id.clone(), self.child(key), value.into());
        self.deferred(request)
    }

    pub fn has(&self, key: impl Into<PropertyKey>) -> Deferred {
        self.deferred(ReflectRequest::has(self.id.clone(), self.child(key)))
    }

    pub fn delete_property(&self, key: impl Into<PropertyKey>) -> Deferred {
        self.deferred(ReflectRequest::delete_property(self.id.clone(), self.child(key)))
    }

    pub fn own_keys(&self) -> Deferred {
        self.deferred(ReflectRequest::own_keys(self.id.clone(), self.path.clone()))
    }

    /// Call the target as a function.
    pub fn apply(&self, args: Vec<WireValue>) -> Deferred {
        self.deferred(ReflectRequest::apply(self.id.clone(), self.path.clone(), args))
    }

    /// Call a method with this target as the receiver.
    pub fn call(&self, method: impl Into<PropertyKey>, args: Vec<WireValue>) -> Deferred {
        self.prop(method).apply(args)
    }

    pub fn construct(&self, args: Vec<WireValue>) -> Deferred {
        self.deferred(ReflectRequest::construct(self.id.clone(), self.path.clone(), args))
    }

    /// Debug rendering from the host. Never fails on the host side.
    pub async fn print(&self) -> Result<String> {
        self.client
            .print_object(self.id.clone(), self.path.clone())
            .await
    }

    /// Whether both handles address the same host object and path.
    pub fn same_target(&self, other: &ObjectProxy) -> bool {
        self.id == other.id && self.path == other.path
    }

    fn child(&self, key: impl Into<PropertyKey>) -> Vec<PropertyKey> {
        let mut path = self.path.clone();
        path.push(key.into());
        path
    }

    fn deferred(&self, request: ReflectRequest) -> Deferred {
        Deferred::new(self.client.clone(), request)
    }
}

impl fmt::Debug for ObjectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProxy")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("path", &display_path(&self.path))
            .finish()
    }
}

/// What a remote operation produced on the worker side.
#[derive(Clone, Debug)]
pub enum RemoteValue {
    /// Plain data, copied.
    Data(Value),
    /// A further host object.
    Object(ObjectProxy),
}

impl RemoteValue {
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            RemoteValue::Data(value) => Some(value),
            RemoteValue::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectProxy> {
        match self {
            RemoteValue::Object(proxy) => Some(proxy),
            RemoteValue::Data(_) => None,
        }
    }

    pub fn into_data(self) -> Result<Value> {
        match self {
            RemoteValue::Data(value) => Ok(value),
            RemoteValue::Object(proxy) => Err(mismatch("plain data", &proxy)),
        }
    }

    pub fn into_object(self) -> Result<ObjectProxy> {
        match self {
            RemoteValue::Object(proxy) => Ok(proxy),
            RemoteValue::Data(value) => Err(ProxyError::OperationFailed(
                OperationError::type_error(format!(
                    "expected a remote object, found {}",
                    value.type_name()
                )),
            )),
        }
    }

    /// Interpret a boolean answer (`has`, `delete_property`).
    pub fn into_bool(self) -> Result<bool> {
        match self.into_data()? {
            Value::Bool(b) => Ok(b),
            other => Err(ProxyError::OperationFailed(OperationError::type_error(
                format!("expected a boolean, found {}", other.type_name()),
            ))),
        }
    }

    /// Interpret an `own_keys` answer.
    pub fn into_keys(self) -> Result<Vec<PropertyKey>> {
        match self.into_data()? {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(name) => Some(PropertyKey::Name(name)),
                    _ => None,
                })
                .collect()),
            other => Err(ProxyError::OperationFailed(OperationError::type_error(
                format!("expected a key list, found {}", other.type_name()),
            ))),
        }
    }

    /// Deserialize plain data into a Rust type.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        from_value(self.into_data()?)
    }
}

fn mismatch(expected: &str, proxy: &ObjectProxy) -> ProxyError {
    ProxyError::OperationFailed(OperationError::type_error(format!(
        "expected {}, found remote object {}",
        expected, proxy.id
    )))
}

//! Host-side table from object ids to live values.

use std::collections::HashMap;

use syncproxy_core::{ObjectId, ProxyError, RemoteKind, RemoteRef, Result, WireValue};
use tracing::trace;

use super::object::{HostValue, SharedRecord};

/// Maps ids to the host values they stand for.
///
/// Entries live until the registry is dropped with its session; there is
/// no reference counting. A value that crosses the boundary twice keeps
/// its first id.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ObjectId, HostValue>,
    ids: HashMap<usize, ObjectId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh id for a root object.
    ///
    /// Plain data is moved into a [`SharedRecord`] first so that writes
    /// through the proxy persist.
    pub fn register_root(&mut self, value: impl Into<HostValue>) -> ObjectId {
        let value = match value.into() {
            HostValue::Data(data) => HostValue::Record(SharedRecord::new(data)),
            other => other,
        };
        let id = ObjectId::new();
        self.insert(id.clone(), value);
        id
    }

    /// Look up the value behind an id.
    pub fn resolve(&self, id: &ObjectId) -> Result<HostValue> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| ProxyError::UnknownObjectId(id.clone()))
    }

    /// Prepare a result for crossing the boundary.
    ///
    /// Plain data passes through and shared records cross as a snapshot.
    /// Objects, functions and promises are registered (or found) and
    /// replaced by a remote reference.
    pub fn adopt(&mut self, value: HostValue) -> WireValue {
        let kind = match &value {
            HostValue::Data(data) => return WireValue::Data(data.clone()),
            HostValue::Record(record) => return WireValue::Data(record.snapshot()),
            HostValue::Object(object) => object.kind(),
            HostValue::Promise(_) => RemoteKind::Promise,
        };
        let id = match value.identity().and_then(|key| self.ids.get(&key)) {
            Some(id) => id.clone(),
            None => {
                let id = ObjectId::new();
                self.insert(id.clone(), value);
                id
            }
        };
        WireValue::Remote(RemoteRef { id, kind })
    }

    /// Turn an incoming argument back into a host value.
    pub fn revive(&self, value: WireValue) -> Result<HostValue> {
        match value {
            WireValue::Data(data) => Ok(HostValue::Data(data)),
            WireValue::Remote(remote) => self.resolve(&remote.id),
        }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, id: ObjectId, value: HostValue) {
        trace!(%id, kind = value.type_name(), "registering host value");
        if let Some(key) = value.identity() {
            self.ids.entry(key).or_insert_with(|| id.clone());
        }
        self.entries.insert(id, value);
    }
}

//! Worker-side synchronous view of the host filesystem.

use std::collections::BTreeMap;
use std::io;

use syncproxy_core::Value;
use syncproxy_object_proxy::{ObjectProxy, RemoteValue};

use super::from_envelope;

/// Blocking filesystem calls for code that cannot suspend.
///
/// Every call parks the worker thread until the host's asynchronous
/// filesystem answers. Failed envelopes become `io::Error`s: status 404 maps
/// to `NotFound`, 400 to `InvalidInput`, anything else to
/// `PermissionDenied`.
#[derive(Clone, Debug)]
pub struct SyncFs {
    fs: ObjectProxy,
}

impl SyncFs {
    pub fn new(fs: ObjectProxy) -> Self {
        Self { fs }
    }

    /// File contents, or `None` for a directory.
    pub fn get(&self, path: &str) -> io::Result<Option<String>> {
        let data = self.call("get", [("path", Value::from(path))])?;
        match data {
            Value::String(contents) => Ok(Some(contents)),
            Value::Null => Ok(None),
            other => Err(unexpected(&other)),
        }
    }

    /// Create or replace a file, or a directory when `value` is `None`.
    pub fn put(&self, path: &str, value: Option<&str>) -> io::Result<()> {
        self.call("put", [("path", Value::from(path)), ("value", Value::from(value))])?;
        Ok(())
    }

    pub fn delete(&self, path: &str) -> io::Result<()> {
        self.call("delete", [("path", Value::from(path))])?;
        Ok(())
    }

    /// Move or rename an entry.
    pub fn rename(&self, path: &str, new_path: &str) -> io::Result<()> {
        self.call(
            "move",
            [("path", Value::from(path)), ("newPath", Value::from(new_path))],
        )?;
        Ok(())
    }

    pub fn list_directory(&self, path: &str) -> io::Result<Vec<String>> {
        match self.call("listDirectory", [("path", Value::from(path))])? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(name) => Ok(name),
                    other => Err(unexpected(&other)),
                })
                .collect(),
            other => Err(unexpected(&other)),
        }
    }

    fn call<const N: usize>(&self, method: &str, options: [(&str, Value); N]) -> io::Result<Value> {
        let options: BTreeMap<String, Value> = options
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        let envelope = self
            .fs
            .call(method, vec![Value::Map(options).into()])
            .then_sync()
            .and_then(RemoteValue::into_data)
            .map_err(io::Error::other)?;
        let result = from_envelope(envelope).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "filesystem reply is not an envelope")
        })?;
        result.map_err(io::Error::from)
    }
}

fn unexpected(value: &Value) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("unexpected {} in filesystem reply", value.type_name()),
    )
}

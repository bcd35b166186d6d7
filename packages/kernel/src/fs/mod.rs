//! The filesystem root: a host-side asynchronous filesystem and the
//! worker-side adapter that makes it look synchronous.
//!
//! Every operation answers with an envelope instead of failing across the
//! boundary: `{ok: true, data}` or `{ok: false, status, error, detail?}`.
//! The worker adapter turns failed envelopes into `std::io::Error`s.

mod callbacks;
mod memory;
mod object;
mod sync;

use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use syncproxy_core::Value;
use thiserror::Error;

pub use callbacks::{
    EmptyFileSystem, GetFn, PutFn, ReadOnlyFileSystem, ReadWriteFileSystem, SanitizeOptions,
    WriteOnlyFileSystem,
};
pub use memory::MemoryFileSystem;
pub use object::FileSystemObject;
pub use sync::SyncFs;

/// A failed filesystem operation, in the shape carried by envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{status}: {error}")]
pub struct FsError {
    /// HTTP-like status code: 404 missing, 400 malformed, anything else
    /// refused.
    pub status: u16,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FsError {
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            detail: None,
        }
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(404, format!("no such file or directory: {}", path))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The native error kind a status maps to.
    pub fn kind(&self) -> io::ErrorKind {
        match self.status {
            404 => io::ErrorKind::NotFound,
            400 => io::ErrorKind::InvalidInput,
            _ => io::ErrorKind::PermissionDenied,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        io::Error::new(e.kind(), e)
    }
}

/// Result of a filesystem operation.
pub type FsResult<T> = std::result::Result<T, FsError>;

/// The authoritative, asynchronous filesystem on the host.
///
/// `get` distinguishes files (`Some(contents)`) from directories (`None`);
/// `put` with `None` creates a directory.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Path prefix this filesystem is mounted at on the worker.
    fn root(&self) -> &str;

    async fn get(&self, path: &str) -> FsResult<Option<String>>;

    async fn put(&self, path: &str, value: Option<String>) -> FsResult<()>;

    async fn delete(&self, path: &str) -> FsResult<()>;

    /// Move or rename an entry.
    async fn rename(&self, path: &str, new_path: &str) -> FsResult<()>;

    async fn list_directory(&self, path: &str) -> FsResult<Vec<String>>;
}

/// Encode a result as an envelope.
pub fn to_envelope(result: FsResult<Value>) -> Value {
    let mut map = BTreeMap::new();
    match result {
        Ok(data) => {
            map.insert("ok".to_string(), Value::Bool(true));
            map.insert("data".to_string(), data);
        }
        Err(e) => {
            map.insert("ok".to_string(), Value::Bool(false));
            map.insert("status".to_string(), Value::Integer(i64::from(e.status)));
            map.insert("error".to_string(), Value::String(e.error));
            if let Some(detail) = e.detail {
                map.insert("detail".to_string(), Value::String(detail));
            }
        }
    }
    Value::Map(map)
}

/// Decode an envelope. `None` if the value is not an envelope at all.
pub fn from_envelope(envelope: Value) -> Option<FsResult<Value>> {
    let Value::Map(mut map) = envelope else {
        return None;
    };
    match map.remove("ok")? {
        Value::Bool(true) => Some(Ok(map.remove("data").unwrap_or_default())),
        Value::Bool(false) => {
            let status = map.get("status").and_then(Value::as_i64)?;
            let error = map
                .remove("error")
                .and_then(|e| e.as_str().map(str::to_string))
                .unwrap_or_default();
            let detail = map
                .remove("detail")
                .and_then(|d| d.as_str().map(str::to_string));
            Some(Err(FsError {
                status: u16::try_from(status).ok()?,
                error,
                detail,
            }))
        }
        _ => None,
    }
}

/// Join path segments with single slashes, ignoring empty segments.
///
/// A leading slash on the first segment is kept.
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let absolute = parts
        .first()
        .is_some_and(|first| first.as_ref().starts_with('/'));
    let joined = parts
        .iter()
        .map(|part| part.as_ref().trim_matches('/'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Resolve `path` against `root`, treating absolute paths as relative.
pub fn from_root(root: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if root.ends_with('/') {
        format!("{}{}", root, path)
    } else {
        format!("{}/{}", root, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_shapes() {
        let ok = to_envelope(Ok(Value::from("contents")));
        assert_eq!(
            syncproxy_core::value_to_json(ok.clone()),
            serde_json::json!({"ok": true, "data": "contents"})
        );
        assert_eq!(from_envelope(ok), Some(Ok(Value::from("contents"))));

        let err = to_envelope(Err(FsError::not_found("a.txt").with_detail("gone")));
        assert_eq!(
            syncproxy_core::value_to_json(err.clone()),
            serde_json::json!({
                "ok": false,
                "status": 404,
                "error": "no such file or directory: a.txt",
                "detail": "gone"
            })
        );
        let Some(Err(e)) = from_envelope(err) else {
            panic!("expected failed envelope");
        };
        assert_eq!(e.status, 404);
        assert_eq!(e.detail.as_deref(), Some("gone"));
    }

    #[test]
    fn non_envelopes_are_rejected() {
        assert_eq!(from_envelope(Value::from("nope")), None);
        assert_eq!(from_envelope(Value::map()), None);
    }

    #[test]
    fn status_maps_to_error_kind() {
        assert_eq!(FsError::not_found("x").kind(), io::ErrorKind::NotFound);
        assert_eq!(FsError::invalid("x").kind(), io::ErrorKind::InvalidInput);
        assert_eq!(FsError::new(500, "x").kind(), io::ErrorKind::PermissionDenied);

        let e: io::Error = FsError::not_found("x").into();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn join_trims_slashes() {
        assert_eq!(join(&["/home/", "/pyodide/", "a.py"]), "/home/pyodide/a.py");
        assert_eq!(join(&["dir", "", "file"]), "dir/file");
        assert_eq!(join::<&str>(&[]), "");
    }

    #[test]
    fn from_root_resolves() {
        assert_eq!(from_root("/home/pyodide", "temp.py"), "/home/pyodide/temp.py");
        assert_eq!(from_root("/home/pyodide/", "/main.py"), "/home/pyodide/main.py");
    }
}

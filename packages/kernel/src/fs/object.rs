//! Exposes a [`FileSystem`] to the worker as a host object.

use std::collections::BTreeMap;
use std::sync::Arc;

use syncproxy_core::{PropertyKey, Value};
use syncproxy_object_proxy::{HostObject, HostPromise, HostValue, OpResult};
use tracing::info;

use super::{to_envelope, FileSystem, FsError, FsResult};

const METHODS: &[&str] = &["get", "put", "delete", "move", "listDirectory"];

/// Host object wrapping a filesystem.
///
/// Each method takes one options record (`{path}`, `{path, value}` or
/// `{path, newPath}`) and returns a promise of an envelope. Failures,
/// including malformed options, are reported inside the envelope.
pub struct FileSystemObject {
    fs: Arc<dyn FileSystem>,
    log: bool,
}

impl FileSystemObject {
    pub fn new(fs: Arc<dyn FileSystem>, log: bool) -> Self {
        Self { fs, log }
    }
}

impl HostObject for FileSystemObject {
    fn get(&self, key: &PropertyKey) -> OpResult<HostValue> {
        Ok(match key.as_name() {
            Some("root") => HostValue::Data(Value::from(self.fs.root())),
            Some(name) if METHODS.contains(&name) => {
                let fs = Arc::clone(&self.fs);
                let log = self.log;
                let method = name.to_string();
                HostValue::function(name, move |args| {
                    Ok(dispatch(Arc::clone(&fs), log, &method, args))
                })
            }
            _ => HostValue::null(),
        })
    }

    fn has(&self, key: &PropertyKey) -> OpResult<bool> {
        Ok(key
            .as_name()
            .is_some_and(|name| name == "root" || METHODS.contains(&name)))
    }

    fn own_keys(&self) -> OpResult<Vec<PropertyKey>> {
        Ok(std::iter::once("root")
            .chain(METHODS.iter().copied())
            .map(PropertyKey::from)
            .collect())
    }

    fn call_method(&self, name: &PropertyKey, args: Vec<HostValue>) -> OpResult<HostValue> {
        match name.as_name() {
            Some(method) if METHODS.contains(&method) => {
                Ok(dispatch(Arc::clone(&self.fs), self.log, method, args))
            }
            _ => Err(syncproxy_core::OperationError::type_error(format!(
                "fs.{} is not a function",
                name
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("[object FileSystem {}]", self.fs.root())
    }
}

/// Options record passed to every method.
struct Options {
    path: String,
    value: Option<String>,
    new_path: Option<String>,
}

fn options(args: Vec<HostValue>) -> FsResult<Options> {
    let record = args
        .into_iter()
        .next()
        .and_then(|arg| arg.into_value().ok())
        .and_then(|value| match value {
            Value::Map(map) => Some(map),
            _ => None,
        })
        .ok_or_else(|| FsError::invalid("expected an options record"))?;
    let text = |map: &BTreeMap<String, Value>, key: &str| {
        map.get(key).and_then(Value::as_str).map(str::to_string)
    };
    Ok(Options {
        path: text(&record, "path").ok_or_else(|| FsError::invalid("missing path"))?,
        value: text(&record, "value"),
        new_path: text(&record, "newPath"),
    })
}

fn dispatch(fs: Arc<dyn FileSystem>, log: bool, method: &str, args: Vec<HostValue>) -> HostValue {
    let options = match options(args) {
        Ok(options) => options,
        Err(e) => return HostPromise::resolved(to_envelope(Err(e))).into(),
    };
    if log {
        info!(method, path = %options.path, "filesystem call");
    }
    let method = method.to_string();
    HostPromise::from_future(async move {
        let result = match method.as_str() {
            "get" => fs
                .get(&options.path)
                .await
                .map(|contents| contents.map(Value::String).unwrap_or_default()),
            "put" => fs.put(&options.path, options.value).await.map(|()| Value::Null),
            "delete" => fs.delete(&options.path).await.map(|()| Value::Null),
            "move" => match options.new_path {
                Some(new_path) => fs.rename(&options.path, &new_path).await.map(|()| Value::Null),
                None => Err(FsError::invalid("missing newPath")),
            },
            "listDirectory" => fs
                .list_directory(&options.path)
                .await
                .map(|names| Value::Array(names.into_iter().map(Value::String).collect())),
            other => Err(FsError::invalid(format!("unknown method {}", other))),
        };
        Ok(HostValue::Data(to_envelope(result)))
    })
    .into()
}

#[cfg(test)]
mod tests {
    use collection_literals::btree;

    use super::*;
    use crate::fs::{from_envelope, MemoryFileSystem};

    fn object() -> FileSystemObject {
        let fs = MemoryFileSystem::default().with_file("/home/pyodide/a.txt", "alpha");
        FileSystemObject::new(Arc::new(fs), false)
    }

    fn opts(path: &str) -> Vec<HostValue> {
        vec![HostValue::Data(Value::Map(btree! {
            "path".to_string() => Value::from(path),
        }))]
    }

    async fn envelope(value: HostValue) -> FsResult<Value> {
        let HostValue::Promise(promise) = value else {
            panic!("expected a promise");
        };
        let data = promise.settled().await.unwrap().into_value().unwrap();
        from_envelope(data).unwrap()
    }

    #[tokio::test]
    async fn methods_resolve_to_envelopes() {
        let fs = object();
        let result = fs.call_method(&"get".into(), opts("/home/pyodide/a.txt")).unwrap();
        assert_eq!(envelope(result).await, Ok(Value::from("alpha")));

        let result = fs.call_method(&"get".into(), opts("/home/pyodide/b.txt")).unwrap();
        assert_eq!(envelope(result).await.unwrap_err().status, 404);
    }

    #[tokio::test]
    async fn malformed_options_stay_inside_the_envelope() {
        let fs = object();
        let result = fs.call_method(&"get".into(), Vec::new()).unwrap();
        assert_eq!(envelope(result).await.unwrap_err().status, 400);
    }

    #[tokio::test]
    async fn methods_are_properties_too() {
        let fs = object();
        let HostValue::Object(list) = fs.get(&"listDirectory".into()).unwrap() else {
            panic!("expected a function");
        };
        let names = envelope(list.apply(opts("/home/pyodide")).unwrap()).await;
        assert_eq!(names, Ok(Value::from(vec!["a.txt"])));
    }

    #[test]
    fn shape() {
        let fs = object();
        assert_eq!(
            fs.get(&"root".into()).unwrap().as_data(),
            Some(&Value::from("/home/pyodide"))
        );
        assert!(fs.has(&"move".into()).unwrap());
        assert_eq!(fs.own_keys().unwrap().len(), 6);
        assert!(fs.call_method(&"format".into(), Vec::new()).is_err());
    }
}

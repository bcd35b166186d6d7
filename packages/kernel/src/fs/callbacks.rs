//! Filesystems assembled from plain callbacks.

use std::sync::Arc;

use async_trait::async_trait;

use super::{FileSystem, FsResult};
use crate::config::DEFAULT_ROOT;

/// Reads a file's contents; `None` means "not a file here".
pub type GetFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Stores a file's contents; `None` contents mark a directory.
pub type PutFn = Arc<dyn Fn(&str, Option<String>) + Send + Sync>;

/// How worker paths are rewritten before they reach a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeOptions {
    /// Mount point on the worker.
    pub root: String,
    /// Strip `root` from the front of paths.
    pub remove_root: bool,
    /// Then strip one leading `/`.
    pub remove_leading_slash: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            remove_root: true,
            remove_leading_slash: true,
        }
    }
}

impl SanitizeOptions {
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// `/home/pyodide/data/a.csv` becomes `data/a.csv` with the defaults.
    pub fn sanitize<'a>(&self, path: &'a str) -> &'a str {
        let mut path = path;
        if self.remove_root {
            path = path.strip_prefix(self.root.as_str()).unwrap_or(path);
        }
        if self.remove_leading_slash {
            path = path.strip_prefix('/').unwrap_or(path);
        }
        path
    }
}

/// Accepts every operation and stores nothing.
///
/// Every path reads as an empty directory.
#[derive(Debug, Clone)]
pub struct EmptyFileSystem {
    root: String,
}

impl EmptyFileSystem {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for EmptyFileSystem {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

#[async_trait]
impl FileSystem for EmptyFileSystem {
    fn root(&self) -> &str {
        &self.root
    }

    async fn get(&self, _path: &str) -> FsResult<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _path: &str, _value: Option<String>) -> FsResult<()> {
        Ok(())
    }

    async fn delete(&self, _path: &str) -> FsResult<()> {
        Ok(())
    }

    async fn rename(&self, _path: &str, _new_path: &str) -> FsResult<()> {
        Ok(())
    }

    async fn list_directory(&self, _path: &str) -> FsResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Serves reads from a callback; writes are accepted and dropped.
pub struct ReadOnlyFileSystem {
    get: GetFn,
    options: SanitizeOptions,
    fallback: EmptyFileSystem,
}

impl ReadOnlyFileSystem {
    pub fn new(options: SanitizeOptions, get: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            get: Arc::new(get),
            fallback: EmptyFileSystem::new(options.root.clone()),
            options,
        }
    }
}

#[async_trait]
impl FileSystem for ReadOnlyFileSystem {
    fn root(&self) -> &str {
        &self.options.root
    }

    async fn get(&self, path: &str) -> FsResult<Option<String>> {
        match (self.get)(self.options.sanitize(path)) {
            Some(contents) => Ok(Some(contents)),
            None => self.fallback.get(path).await,
        }
    }

    async fn put(&self, path: &str, value: Option<String>) -> FsResult<()> {
        self.fallback.put(path, value).await
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        self.fallback.delete(path).await
    }

    async fn rename(&self, path: &str, new_path: &str) -> FsResult<()> {
        self.fallback.rename(path, new_path).await
    }

    async fn list_directory(&self, path: &str) -> FsResult<Vec<String>> {
        self.fallback.list_directory(path).await
    }
}

/// Hands writes to a callback; reads see an empty filesystem.
pub struct WriteOnlyFileSystem {
    put: PutFn,
    options: SanitizeOptions,
    fallback: EmptyFileSystem,
}

impl WriteOnlyFileSystem {
    pub fn new(options: SanitizeOptions, put: impl Fn(&str, Option<String>) + Send + Sync + 'static) -> Self {
        Self {
            put: Arc::new(put),
            fallback: EmptyFileSystem::new(options.root.clone()),
            options,
        }
    }
}

#[async_trait]
impl FileSystem for WriteOnlyFileSystem {
    fn root(&self) -> &str {
        &self.options.root
    }

    async fn get(&self, path: &str) -> FsResult<Option<String>> {
        self.fallback.get(path).await
    }

    async fn put(&self, path: &str, value: Option<String>) -> FsResult<()> {
        (self.put)(self.options.sanitize(path), value);
        Ok(())
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        self.fallback.delete(path).await
    }

    async fn rename(&self, path: &str, new_path: &str) -> FsResult<()> {
        self.fallback.rename(path, new_path).await
    }

    async fn list_directory(&self, path: &str) -> FsResult<Vec<String>> {
        self.fallback.list_directory(path).await
    }
}

/// Reads from one callback, writes to another.
pub struct ReadWriteFileSystem {
    read: ReadOnlyFileSystem,
    write: WriteOnlyFileSystem,
}

impl ReadWriteFileSystem {
    pub fn new(
        options: SanitizeOptions,
        get: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
        put: impl Fn(&str, Option<String>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            read: ReadOnlyFileSystem::new(options.clone(), get),
            write: WriteOnlyFileSystem::new(options, put),
        }
    }
}

#[async_trait]
impl FileSystem for ReadWriteFileSystem {
    fn root(&self) -> &str {
        self.write.root()
    }

    async fn get(&self, path: &str) -> FsResult<Option<String>> {
        self.read.get(path).await
    }

    async fn put(&self, path: &str, value: Option<String>) -> FsResult<()> {
        self.write.put(path, value).await
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        self.write.delete(path).await
    }

    async fn rename(&self, path: &str, new_path: &str) -> FsResult<()> {
        self.write.rename(path, new_path).await
    }

    async fn list_directory(&self, path: &str) -> FsResult<Vec<String>> {
        self.write.list_directory(path).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn sanitize_defaults() {
        let options = SanitizeOptions::default();
        assert_eq!(options.sanitize("/home/pyodide/data/a.csv"), "data/a.csv");
        assert_eq!(options.sanitize("/elsewhere/a.csv"), "elsewhere/a.csv");

        let keep = SanitizeOptions {
            remove_root: false,
            remove_leading_slash: false,
            ..SanitizeOptions::default()
        };
        assert_eq!(keep.sanitize("/home/pyodide/a"), "/home/pyodide/a");
    }

    #[tokio::test]
    async fn empty_accepts_everything() {
        let fs = EmptyFileSystem::default();
        assert_eq!(fs.root(), "/home/pyodide");
        assert_eq!(fs.get("/anything").await, Ok(None));
        assert_eq!(fs.put("/a", Some("x".into())).await, Ok(()));
        assert_eq!(fs.list_directory("/").await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn read_only_uses_sanitized_paths() {
        let fs = ReadOnlyFileSystem::new(SanitizeOptions::default(), |path| {
            (path == "main.py").then(|| "print(1)".to_string())
        });
        assert_eq!(fs.get("/home/pyodide/main.py").await, Ok(Some("print(1)".into())));
        assert_eq!(fs.get("/home/pyodide/other.py").await, Ok(None));
    }

    #[tokio::test]
    async fn read_write_routes_calls() {
        let store = Arc::new(Mutex::new(BTreeMap::new()));
        let fs = ReadWriteFileSystem::new(
            SanitizeOptions::with_root("/work"),
            {
                let store = Arc::clone(&store);
                move |path| store.lock().unwrap().get(path).cloned().flatten()
            },
            {
                let store = Arc::clone(&store);
                move |path, value| {
                    store.lock().unwrap().insert(path.to_string(), value);
                }
            },
        );
        fs.put("/work/out.txt", Some("hello".into())).await.unwrap();
        assert_eq!(fs.get("/work/out.txt").await, Ok(Some("hello".into())));
        assert_eq!(fs.root(), "/work");
    }
}

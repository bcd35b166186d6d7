//! An in-memory filesystem.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::warn;

use super::{FileSystem, FsError, FsResult, SanitizeOptions};

/// Entry contents: `Some` for a file, `None` for a directory.
type Entries = BTreeMap<String, Option<String>>;

/// A read/write filesystem held in memory.
///
/// Keys are sanitized, slash-separated relative paths. The empty path is the
/// root directory and always exists. Writing a file creates its parent
/// directories.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    options: SanitizeOptions,
    entries: Mutex<Entries>,
}

impl MemoryFileSystem {
    pub fn new(options: SanitizeOptions) -> Self {
        Self {
            options,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Builder-style file creation, for seeding.
    ///
    /// A path beneath an existing file is skipped.
    pub fn with_file(self, path: &str, contents: impl Into<String>) -> Self {
        let key = self.key(path);
        {
            let mut entries = self.lock();
            match check_parents(&entries, &key, path) {
                Ok(()) => insert(&mut entries, key, Some(contents.into())),
                Err(e) => warn!(error = %e, "skipping seeded file"),
            }
        }
        self
    }

    /// Current contents of a file, bypassing the async interface.
    pub fn read(&self, path: &str) -> Option<String> {
        self.lock().get(&self.key(path)).cloned().flatten()
    }

    fn key(&self, path: &str) -> String {
        self.options.sanitize(path).trim_matches('/').to_string()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fails with 400 if any ancestor of `key` is a file.
fn check_parents(entries: &Entries, key: &str, path: &str) -> FsResult<()> {
    let mut parent = key;
    while let Some((dir, _)) = parent.rsplit_once('/') {
        if let Some(Some(_)) = entries.get(dir) {
            return Err(FsError::invalid(format!("{} is beneath a file", path)));
        }
        parent = dir;
    }
    Ok(())
}

fn insert(entries: &mut Entries, key: String, value: Option<String>) {
    let mut parent = key.as_str();
    while let Some((dir, _)) = parent.rsplit_once('/') {
        entries.entry(dir.to_string()).or_insert(None);
        parent = dir;
    }
    entries.insert(key, value);
}

fn is_within(key: &str, dir: &str) -> bool {
    key.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    fn root(&self) -> &str {
        &self.options.root
    }

    async fn get(&self, path: &str) -> FsResult<Option<String>> {
        let key = self.key(path);
        if key.is_empty() {
            return Ok(None);
        }
        self.lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| FsError::not_found(path))
    }

    async fn put(&self, path: &str, value: Option<String>) -> FsResult<()> {
        let key = self.key(path);
        if key.is_empty() {
            return Err(FsError::invalid("cannot replace the root directory"));
        }
        let mut entries = self.lock();
        if value.is_some() && entries.keys().any(|k| is_within(k, &key)) {
            return Err(FsError::invalid(format!("{} is a non-empty directory", path)));
        }
        check_parents(&entries, &key, path)?;
        insert(&mut entries, key, value);
        Ok(())
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        let key = self.key(path);
        if key.is_empty() {
            return Err(FsError::forbidden("cannot delete the root directory"));
        }
        let mut entries = self.lock();
        if entries.remove(&key).is_none() {
            return Err(FsError::not_found(path));
        }
        entries.retain(|k, _| !is_within(k, &key));
        Ok(())
    }

    async fn rename(&self, path: &str, new_path: &str) -> FsResult<()> {
        let from = self.key(path);
        let to = self.key(new_path);
        if from.is_empty() || to.is_empty() {
            return Err(FsError::forbidden("cannot move the root directory"));
        }
        if is_within(&to, &from) {
            return Err(FsError::invalid(format!("cannot move {} into itself", path)));
        }
        let mut entries = self.lock();
        check_parents(&entries, &to, new_path)?;
        let value = entries.remove(&from).ok_or_else(|| FsError::not_found(path))?;
        let children: Vec<(String, Option<String>)> = entries
            .iter()
            .filter(|(k, _)| is_within(k, &from))
            .map(|(k, v)| (format!("{}{}", to, &k[from.len()..]), v.clone()))
            .collect();
        entries.retain(|k, _| !is_within(k, &from));
        insert(&mut entries, to, value);
        entries.extend(children);
        Ok(())
    }

    async fn list_directory(&self, path: &str) -> FsResult<Vec<String>> {
        let key = self.key(path);
        let entries = self.lock();
        if !key.is_empty() {
            match entries.get(&key) {
                None => return Err(FsError::not_found(path)),
                Some(Some(_)) => return Err(FsError::invalid(format!("{} is a file", path))),
                Some(None) => {}
            }
        }
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        };
        Ok(entries
            .keys()
            .filter_map(|k| k.strip_prefix(prefix.as_str()))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }
}

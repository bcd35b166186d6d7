//! Session configuration.

use std::path::Path;

use serde::Deserialize;
use syncproxy_object_proxy::ExclusionSet;
use syncproxy_core::PropertyKey;
use syncproxy_shared_memory::SharedChannelConfig;

use crate::error::{KernelError, Result};

/// Workspace root used when none is configured.
pub const DEFAULT_ROOT: &str = "/home/pyodide";

/// Settings for one host/worker session.
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sizing of the shared regions.
    pub channel: SharedChannelConfig,
    /// Workspace root; relative run paths resolve against it.
    pub root: String,
    /// Global properties the worker serves locally instead of proxying.
    pub exclusions: ExclusionSet,
    /// Log every filesystem call the worker makes.
    pub fs_log: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel: SharedChannelConfig::default(),
            root: DEFAULT_ROOT.to_string(),
            exclusions: default_global_exclusions(),
            fs_log: false,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| KernelError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// Global properties an embedded runtime inspects synchronously, before any
/// round trip could complete.
///
/// Browser-worker capabilities the worker has itself, the runtime's own
/// module globals, and the probes it performs on every foreign object.
pub fn default_global_exclusions() -> ExclusionSet {
    const NAMES: &[&str] = &[
        "location",
        "self",
        "importScripts",
        "addEventListener",
        "removeEventListener",
        "caches",
        "crypto",
        "indexedDB",
        "isSecureContext",
        "origin",
        "performance",
        "atob",
        "btoa",
        "clearInterval",
        "clearTimeout",
        "createImageBitmap",
        "fetch",
        "queueMicrotask",
        "setInterval",
        "setTimeout",
        "$$",
        "pyodide",
        "__name__",
        "__package__",
        "__path__",
        "__loader__",
        "stack",
        "get",
        "set",
        "has",
        "size",
        "length",
        "then",
        "includes",
        "next",
    ];
    let mut set: ExclusionSet = NAMES.iter().copied().collect();
    set.insert(PropertyKey::iterator());
    set
}

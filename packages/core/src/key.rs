//! Property keys and paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of a property path.
///
/// Most keys are names (`"length"`, `"get"`, `"0"`). Symbols are the
/// handful of well-known hooks an embedded runtime probes
/// (`Symbol.iterator` and friends); they never address plain data.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyKey {
    /// A string property name. Array indices are names too.
    Name(String),
    /// A symbol, identified by its description (e.g. `"Symbol.iterator"`).
    Symbol { symbol: String },
}

impl PropertyKey {
    /// Create a name key.
    pub fn name(name: impl Into<String>) -> Self {
        PropertyKey::Name(name.into())
    }

    /// Create a symbol key.
    pub fn symbol(description: impl Into<String>) -> Self {
        PropertyKey::Symbol {
            symbol: description.into(),
        }
    }

    /// The well-known iteration symbol.
    pub fn iterator() -> Self {
        Self::symbol("Symbol.iterator")
    }

    /// The name, if this is a name key.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            PropertyKey::Name(name) => Some(name),
            PropertyKey::Symbol { .. } => None,
        }
    }

    /// The array index this key denotes, if any.
    ///
    /// Only canonical decimal forms count: `"01"` is a name, not index 1.
    pub fn as_index(&self) -> Option<usize> {
        let name = self.as_name()?;
        let index: usize = name.parse().ok()?;
        (index.to_string() == name).then_some(index)
    }

    /// Whether this is a symbol key.
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol { .. })
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(name) => f.write_str(name),
            PropertyKey::Symbol { symbol } => write!(f, "[{}]", symbol),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(name.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::Name(name)
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        PropertyKey::Name(index.to_string())
    }
}

/// Render a property path for logs and error messages, e.g. `fs.get` or
/// `items.0.[Symbol.iterator]`.
pub fn display_path(path: &[PropertyKey]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Build a `Vec<PropertyKey>` from key-like literals.
///
/// ```rust
/// use syncproxy_core::{path, PropertyKey};
///
/// let p = path!["items", 0usize];
/// assert_eq!(p, vec![PropertyKey::name("items"), PropertyKey::name("0")]);
/// assert!(path![].is_empty());
/// ```
#[macro_export]
macro_rules! path {
    () => {
        ::std::vec::Vec::<$crate::PropertyKey>::new()
    };
    ($($key:expr),+ $(,)?) => {
        vec![$($crate::PropertyKey::from($key)),+]
    };
}

//! The Value type - plain data that crosses the boundary by copy.
//!
//! Anything representable as a `Value` is serialisable and has no identity:
//! numbers, strings, booleans, null, and records or lists containing only
//! such values. Everything else (objects with behaviour, functions,
//! promises) crosses as a remote reference instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{OperationError, PropertyKey};

/// A tree-shaped plain value.
///
/// # Design Notes
///
/// - Uses `BTreeMap` for deterministic ordering (stable `own_keys`, stable
///   encoding, cheap comparison)
/// - Includes `Bytes` for binary file contents
/// - Uses `i64` for integers, `f64` for everything else numeric
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absence of a value. Reading a missing property yields `Null`.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Record with string keys.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Create a null value.
    pub fn null() -> Self {
        Value::Null
    }

    /// Create an empty map.
    pub fn map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a map.
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Check if this value is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Borrow the string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "object",
        }
    }

    /// Read one property.
    ///
    /// Maps expose their entries, arrays and strings expose indices and
    /// `length`. A missing property reads as `Ok(Null)`; reading anything
    /// off `null` is a `TypeError`.
    pub fn property(&self, key: &PropertyKey) -> Result<Value, OperationError> {
        let name = match key.as_name() {
            Some(name) => name,
            None if self.is_null() => return Err(null_access(key)),
            None => return Ok(Value::Null),
        };

        let value = match self {
            Value::Null => return Err(null_access(key)),
            Value::Map(map) => map.get(name).cloned(),
            Value::Array(arr) if name == "length" => Some(Value::Integer(arr.len() as i64)),
            Value::Array(arr) => key.as_index().and_then(|i| arr.get(i)).cloned(),
            Value::String(s) if name == "length" => {
                Some(Value::Integer(s.chars().count() as i64))
            }
            Value::String(s) => key
                .as_index()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string())),
            Value::Bytes(b) if name == "length" => Some(Value::Integer(b.len() as i64)),
            Value::Bytes(b) => key
                .as_index()
                .and_then(|i| b.get(i))
                .map(|byte| Value::Integer(i64::from(*byte))),
            _ => None,
        };
        Ok(value.unwrap_or(Value::Null))
    }

    /// Whether a property exists.
    pub fn has_property(&self, key: &PropertyKey) -> bool {
        let Some(name) = key.as_name() else {
            return false;
        };
        match self {
            Value::Map(map) => map.contains_key(name),
            Value::Array(arr) => name == "length" || key.as_index().is_some_and(|i| i < arr.len()),
            Value::String(s) => {
                name == "length" || key.as_index().is_some_and(|i| i < s.chars().count())
            }
            Value::Bytes(b) => name == "length" || key.as_index().is_some_and(|i| i < b.len()),
            _ => false,
        }
    }

    /// Enumerate own property keys.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        match self {
            Value::Map(map) => map.keys().map(|k| PropertyKey::name(k.as_str())).collect(),
            Value::Array(arr) => (0..arr.len())
                .map(PropertyKey::from)
                .chain(std::iter::once(PropertyKey::name("length")))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Get a reference to a nested value by path.
    ///
    /// Returns `None` if the path doesn't exist or can't be navigated
    /// (e.g., trying to index into a string).
    pub fn get(&self, path: &[PropertyKey]) -> Option<&Value> {
        let mut current = self;
        for key in path {
            current = match current {
                Value::Map(map) => map.get(key.as_name()?)?,
                Value::Array(arr) => arr.get(key.as_index()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Get a mutable reference to a nested value by path.
    pub fn get_mut(&mut self, path: &[PropertyKey]) -> Option<&mut Value> {
        let mut current = self;
        for key in path {
            current = match current {
                Value::Map(map) => map.get_mut(key.as_name()?)?,
                Value::Array(arr) => arr.get_mut(key.as_index()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set a value at a path, creating intermediate maps as needed.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` if the path traverses a non-container value or
    /// uses a symbol key, and a `RangeError` for an array index past the end.
    pub fn set(&mut self, path: &[PropertyKey], value: Value) -> Result<(), OperationError> {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return Ok(());
        };

        let mut current = self;

        // Navigate to parent, creating intermediate maps
        for key in parents {
            current = match current {
                Value::Map(map) => map
                    .entry(data_name(key)?.to_string())
                    .or_insert_with(Value::map),
                Value::Array(arr) => {
                    let index = array_index(key)?;
                    arr.get_mut(index).ok_or_else(|| {
                        OperationError::range_error(format!("array index {} out of bounds", index))
                    })?
                }
                other => {
                    return Err(OperationError::type_error(format!(
                        "cannot navigate through {} at '{}'",
                        other.type_name(),
                        key
                    )));
                }
            };
        }

        match current {
            Value::Map(map) => {
                map.insert(data_name(last)?.to_string(), value);
                Ok(())
            }
            Value::Array(arr) => {
                let index = array_index(last)?;
                if index < arr.len() {
                    arr[index] = value;
                } else if index == arr.len() {
                    arr.push(value);
                } else {
                    return Err(OperationError::range_error(format!(
                        "array index {} out of bounds",
                        index
                    )));
                }
                Ok(())
            }
            other => Err(OperationError::type_error(format!(
                "cannot set property '{}' on {}",
                last,
                other.type_name()
            ))),
        }
    }

    /// Remove a value at a path, returning it if it existed.
    pub fn remove(&mut self, path: &[PropertyKey]) -> Result<Option<Value>, OperationError> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(Some(std::mem::take(self)));
        };

        let parent = match self.get_mut(parents) {
            Some(p) => p,
            None => return Ok(None),
        };

        match parent {
            Value::Map(map) => Ok(last.as_name().and_then(|name| map.remove(name))),
            Value::Array(arr) => match last.as_index() {
                Some(index) if index < arr.len() => Ok(Some(arr.remove(index))),
                _ => Ok(None),
            },
            other => Err(OperationError::type_error(format!(
                "cannot delete property '{}' of {}",
                last,
                other.type_name()
            ))),
        }
    }
}

fn null_access(key: &PropertyKey) -> OperationError {
    OperationError::type_error(format!("cannot read properties of null (reading '{}')", key))
}

fn data_name(key: &PropertyKey) -> Result<&str, OperationError> {
    key.as_name().ok_or_else(|| {
        OperationError::type_error(format!("symbol key {} cannot address plain data", key))
    })
}

fn array_index(key: &PropertyKey) -> Result<usize, OperationError> {
    key.as_index()
        .ok_or_else(|| OperationError::type_error(format!("invalid array index: {}", key)))
}

// Conversion from common types

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use collection_literals::btree;

    #[test]
    fn get_nested_value() {
        let mut value = Value::map();
        value.set(&path!["foo", "bar"], Value::from("hello")).unwrap();

        assert_eq!(value.get(&path!["foo", "bar"]), Some(&Value::from("hello")));
        let foo = value.get(&path!["foo"]).unwrap();
        assert!(foo.is_map());
        assert_eq!(value.get(&path!["nonexistent"]), None);
    }

    #[test]
    fn set_creates_intermediate_maps() {
        let mut value = Value::map();
        value
            .set(&path!["a", "b", "c", "d"], Value::from(42i64))
            .unwrap();

        assert_eq!(value.get(&path!["a", "b", "c", "d"]), Some(&Value::from(42i64)));
        assert!(value.get(&path!["a", "b"]).unwrap().is_map());
    }

    #[test]
    fn set_through_scalar_is_type_error() {
        let mut value = Value::Map(btree! { "name".to_string() => Value::from("x") });
        let err = value.set(&path!["name", "first"], Value::Null).unwrap_err();
        assert_eq!(err.name, "TypeError");
    }

    #[test]
    fn remove_works() {
        let mut value = Value::map();
        value.set(&path!["foo", "bar"], Value::from("hello")).unwrap();

        let removed = value.remove(&path!["foo", "bar"]).unwrap();
        assert_eq!(removed, Some(Value::from("hello")));
        assert_eq!(value.get(&path!["foo", "bar"]), None);
        assert!(value.get(&path!["foo"]).is_some());
    }

    #[test]
    fn array_properties() {
        let arr = Value::from(vec!["a", "b", "c"]);

        assert_eq!(arr.property(&"length".into()).unwrap(), Value::Integer(3));
        assert_eq!(arr.property(&1usize.into()).unwrap(), Value::from("b"));
        assert_eq!(arr.property(&7usize.into()).unwrap(), Value::Null);
        assert!(arr.has_property(&"length".into()));
        assert!(!arr.has_property(&3usize.into()));
        assert_eq!(arr.own_keys().len(), 4);
    }

    #[test]
    fn string_properties() {
        let s = Value::from("héllo");
        assert_eq!(s.property(&"length".into()).unwrap(), Value::Integer(5));
        assert_eq!(s.property(&1usize.into()).unwrap(), Value::from("é"));
    }

    #[test]
    fn null_property_access_fails() {
        let err = Value::Null.property(&"x".into()).unwrap_err();
        assert_eq!(err.name, "TypeError");
        assert!(err.message.contains("'x'"));
    }

    #[test]
    fn symbol_keys_miss_plain_data() {
        let map = Value::Map(btree! { "a".to_string() => Value::from(1i64) });
        assert_eq!(map.property(&PropertyKey::iterator()).unwrap(), Value::Null);
        assert!(!map.has_property(&PropertyKey::iterator()));
    }

    #[test]
    fn serde_shape_is_tagged() {
        let json = serde_json::to_string(&Value::Integer(3)).unwrap();
        assert_eq!(json, r#"{"type":"integer","value":3}"#);

        let back: Value = serde_json::from_str(r#"{"type":"null"}"#).unwrap();
        assert!(back.is_null());
    }
}

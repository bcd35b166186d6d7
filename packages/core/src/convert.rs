//! Conversions between `Value`, JSON and serde types.
//!
//! Host objects written in Rust usually take and return their own structs;
//! these helpers move them in and out of `Value` through `serde_json`.

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::Value;

/// Deserialize a Rust type out of a `Value`.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value_to_json(value))?)
}

/// Serialize a Rust type into a `Value`.
pub fn to_value<T: Serialize>(data: &T) -> Result<Value> {
    Ok(json_to_value(serde_json::to_value(data)?))
}

/// Convert a `Value` to plain JSON. Bytes become base64 strings.
pub fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Integer(i) => serde_json::Value::Number(i.into()),
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s),
        Value::Bytes(b) => {
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(&b))
        }
        Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert plain JSON to a `Value`.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                // u64 beyond i64::MAX
                Value::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        size: u32,
        directory: bool,
    }

    #[test]
    fn struct_through_value() {
        let entry = Entry {
            name: "notes.txt".to_string(),
            size: 30,
            directory: false,
        };
        let value = to_value(&entry).unwrap();
        assert_eq!(value.get(&crate::path!["size"]), Some(&Value::Integer(30)));
        let back: Entry = from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn json_numbers() {
        let value = json_to_value(serde_json::json!({"i": 42, "f": 2.5, "n": -1}));
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        assert_eq!(map.get("i"), Some(&Value::Integer(42)));
        assert_eq!(map.get("n"), Some(&Value::Integer(-1)));
        assert_eq!(map.get("f"), Some(&Value::Float(2.5)));
    }

    #[test]
    fn bytes_become_base64() {
        let json = value_to_json(Value::Bytes(b"hi".to_vec()));
        assert_eq!(json, serde_json::json!("aGk="));
    }

    #[test]
    fn non_finite_floats_become_null() {
        assert_eq!(value_to_json(Value::Float(f64::NAN)), serde_json::Value::Null);
    }

    #[test]
    fn wrong_shape_is_codec_error() {
        let result: Result<Entry> = from_value(Value::from("nope"));
        assert!(matches!(result, Err(crate::ProxyError::Codec(_))));
    }
}

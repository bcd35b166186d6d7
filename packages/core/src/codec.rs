//! JSON encoding of protocol payloads.
//!
//! Both the message port and the shared data region carry JSON produced
//! here, so a payload's encoded size is exactly what the data region has to
//! hold.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Encode a payload to JSON bytes.
pub fn encode<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(payload)?)
}

/// Decode a payload from JSON bytes.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

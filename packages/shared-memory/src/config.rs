//! Sizing of the shared regions.

use serde::Deserialize;

use crate::data::HEADER_LEN;

/// Configuration for a [`SharedChannel`](crate::SharedChannel).
///
/// Region sizes are a deployment parameter. The data region bounds the
/// largest payload either side can place on the blocking path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SharedChannelConfig {
    /// Size of the data region in bytes, including the length header.
    pub data_capacity: usize,
}

impl SharedChannelConfig {
    /// Default data region size: 1 MiB.
    pub const DEFAULT_DATA_CAPACITY: usize = 1024 * 1024;

    /// Create a config with the given data region size.
    ///
    /// Sizes smaller than the length header are raised to fit it.
    pub fn with_data_capacity(data_capacity: usize) -> Self {
        Self {
            data_capacity: data_capacity.max(HEADER_LEN),
        }
    }

    /// Largest payload the data region can carry.
    pub fn max_payload(&self) -> usize {
        self.data_capacity.saturating_sub(HEADER_LEN)
    }
}

impl Default for SharedChannelConfig {
    fn default() -> Self {
        Self {
            data_capacity: Self::DEFAULT_DATA_CAPACITY,
        }
    }
}

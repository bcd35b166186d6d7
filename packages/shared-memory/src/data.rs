//! The data region: a fixed buffer holding one length-prefixed payload.

use std::sync::{Mutex, PoisonError};

use crate::error::{Result, SharedMemoryError};

/// Bytes reserved at the start of the region for the payload length
/// (little-endian `u32`).
pub const HEADER_LEN: usize = 4;

/// Fixed-size buffer for the payload of the in-flight blocking round trip.
///
/// Only the side that currently holds the lock word may touch the region;
/// the inner mutex exists so safe code can share it, not as a second
/// exclusion protocol.
#[derive(Debug)]
pub struct DataRegion {
    bytes: Mutex<Box<[u8]>>,
}

impl DataRegion {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            bytes: Mutex::new(vec![0u8; capacity.max(HEADER_LEN)].into_boxed_slice()),
        }
    }

    /// Total size of the region, header included.
    pub fn capacity(&self) -> usize {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Largest payload that fits.
    pub fn max_payload(&self) -> usize {
        self.capacity() - HEADER_LEN
    }

    /// Check that a payload of `size` bytes fits, without writing anything.
    pub fn check_fits(&self, size: usize) -> Result<()> {
        let max = self.max_payload();
        if size > max || u32::try_from(size).is_err() {
            return Err(SharedMemoryError::PayloadTooLarge {
                size,
                capacity: max,
            });
        }
        Ok(())
    }

    /// Write a payload, replacing whatever the region held.
    ///
    /// An oversized payload is rejected before a single byte is written.
    pub(crate) fn write(&self, payload: &[u8]) -> Result<()> {
        self.check_fits(payload.len())?;
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let len = payload.len() as u32;
        bytes[..HEADER_LEN].copy_from_slice(&len.to_le_bytes());
        bytes[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);
        Ok(())
    }

    /// Copy the current payload out of the region.
    pub(crate) fn read(&self) -> Result<Vec<u8>> {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);
        let claimed = u32::from_le_bytes(header) as usize;
        let available = bytes.len() - HEADER_LEN;
        if claimed > available {
            return Err(SharedMemoryError::Corrupt { claimed, available });
        }
        Ok(bytes[HEADER_LEN..HEADER_LEN + claimed].to_vec())
    }
}

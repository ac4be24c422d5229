//! Region-table reader over captured process memory.

use crate::process::{MAX_CSTRING_LEN, MemoryError, ProcessMemory};

/// A [`ProcessMemory`] implementation backed by an in-memory region table, for
/// extracting from captured memory images instead of a live process.
///
/// Regions must not overlap. A read must lie entirely within one mapped
/// region; anything else reports [`MemoryError::Unmapped`].
#[derive(Debug, Default)]
pub struct SnapshotMemory {
    // Sorted by base address.
    regions: Vec<Region>,
}

#[derive(Debug)]
struct Region {
    base: u64,
    bytes: Vec<u8>,
}

impl SnapshotMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `bytes` at the absolute `base` address.
    pub fn map_region(&mut self, base: u64, bytes: Vec<u8>) {
        let at = self.regions.partition_point(|r| r.base <= base);
        self.regions.insert(at, Region { base, bytes });
    }

    /// Total number of mapped bytes.
    pub fn mapped_len(&self) -> usize {
        self.regions.iter().map(|r| r.bytes.len()).sum()
    }

    fn region_for(&self, address: u64) -> Option<(&Region, usize)> {
        let idx = self.regions.partition_point(|r| r.base <= address);
        let region = self.regions[..idx].last()?;
        let offset = address - region.base;
        if offset < region.bytes.len() as u64 {
            Some((region, offset as usize))
        } else {
            None
        }
    }
}

impl ProcessMemory for SnapshotMemory {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, MemoryError> {
        let unmapped = || MemoryError::Unmapped { address, length };
        let (region, offset) = self.region_for(address).ok_or_else(unmapped)?;
        let end = offset.checked_add(length).ok_or_else(unmapped)?;
        if end > region.bytes.len() {
            return Err(unmapped());
        }
        Ok(region.bytes[offset..end].to_vec())
    }

    fn read_cstring(&self, address: u64) -> Result<String, MemoryError> {
        let (region, offset) = self.region_for(address).ok_or(MemoryError::Unmapped {
            address,
            length: 1,
        })?;
        let tail = &region.bytes[offset..];
        match tail.iter().take(MAX_CSTRING_LEN).position(|&b| b == 0) {
            Some(nul) => Ok(String::from_utf8_lossy(&tail[..nul]).into_owned()),
            None if tail.len() < MAX_CSTRING_LEN => Err(MemoryError::Unmapped {
                address: region.base + region.bytes.len() as u64,
                length: 1,
            }),
            None => Err(MemoryError::UnterminatedString {
                address,
                limit: MAX_CSTRING_LEN,
            }),
        }
    }
}

//! Run-scoped cache of transient zone buffers.

use std::collections::HashMap;

use tracing::debug;

use crate::error::RipResult;
use crate::process::ProcessMemory;

/// Descriptor read from the zone pool. Registration input for the cache.
#[derive(Debug, Clone)]
pub struct ZoneRecord {
    pub name: String,
    pub index: u32,
    pub positions_ptr: u64,
    pub positions_size: u32,
    pub draw_data_ptr: u64,
    pub draw_data_size: u32,
    pub face_indices_ptr: u64,
    pub face_index_count: u32,
}

/// A zone's buffers, read once and held for the rest of the run.
#[derive(Debug)]
pub struct Zone {
    pub name: String,
    pub positions: Vec<u8>,
    pub draw_data: Vec<u8>,
    pub face_indices: Vec<u8>,
}

/// Lazily loaded zone buffers, scoped to one extraction run.
///
/// Registration only records descriptors. Buffers are read on the first
/// [`ZoneCache::get_or_load`] for an index and never re-read. At most one
/// entry exists per index; registering an index twice keeps the later
/// descriptor.
#[derive(Debug, Default)]
pub struct ZoneCache {
    records: HashMap<u32, ZoneRecord>,
    loaded: HashMap<u32, Zone>,
}

impl ZoneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered zones.
    pub fn registered(&self) -> usize {
        self.records.len()
    }

    /// Records a zone descriptor. A descriptor without a positions buffer is
    /// not resident and is dropped here so lookups treat it as missing.
    pub fn register(&mut self, record: ZoneRecord) {
        if record.positions_ptr == 0 {
            debug!(zone = record.index, name = %record.name, "skipping non-resident zone");
            return;
        }
        self.records.insert(record.index, record);
    }

    /// Returns the zone's buffers, reading them on first use. `None` means
    /// the index was never registered; the caller degrades instead of
    /// failing.
    pub fn get_or_load<R: ProcessMemory>(
        &mut self,
        reader: &R,
        index: u32,
    ) -> RipResult<Option<&Zone>> {
        if !self.loaded.contains_key(&index) {
            let Some(record) = self.records.get(&index) else {
                return Ok(None);
            };
            let zone = Zone {
                name: record.name.clone(),
                positions: read_buffer(reader, record.positions_ptr, record.positions_size as usize)?,
                draw_data: read_buffer(reader, record.draw_data_ptr, record.draw_data_size as usize)?,
                face_indices: read_buffer(
                    reader,
                    record.face_indices_ptr,
                    record.face_index_count as usize * 2,
                )?,
            };
            debug!(
                zone = index,
                name = %zone.name,
                positions = zone.positions.len(),
                draw_data = zone.draw_data.len(),
                "loaded zone buffers"
            );
            self.loaded.insert(index, zone);
        }
        Ok(self.loaded.get(&index))
    }
}

/// Zones may carry empty buffers; those never touch the reader.
fn read_buffer<R: ProcessMemory>(
    reader: &R,
    address: u64,
    length: usize,
) -> RipResult<Vec<u8>> {
    if length == 0 {
        return Ok(Vec::new());
    }
    Ok(reader.read_bytes(address, length)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{CountingMemory, Image};

    fn record(index: u32, positions_ptr: u64) -> ZoneRecord {
        ZoneRecord {
            name: format!("zone_{index}"),
            index,
            positions_ptr,
            positions_size: 4,
            draw_data_ptr: positions_ptr + 0x10,
            draw_data_size: 4,
            face_indices_ptr: positions_ptr + 0x20,
            face_index_count: 2,
        }
    }

    #[test]
    fn test_unregistered_zone_is_missing() {
        let memory = Image::new(0x1000).into_snapshot();
        let mut cache = ZoneCache::new();
        assert!(cache.get_or_load(&memory, 3).unwrap().is_none());
    }

    #[test]
    fn test_null_positions_pointer_is_not_registered() {
        let memory = Image::new(0x1000).into_snapshot();
        let mut cache = ZoneCache::new();
        cache.register(record(3, 0));
        assert_eq!(cache.registered(), 0);
        assert!(cache.get_or_load(&memory, 3).unwrap().is_none());
    }

    #[test]
    fn test_buffers_are_read_once() {
        let mut image = Image::new(0x1000);
        image.put(0x0, &[1, 2, 3, 4]);
        image.put(0x10, &[5, 6, 7, 8]);
        image.put(0x20, &[9, 10, 11, 12]);
        let memory = image.into_snapshot();
        let counting = CountingMemory::new(&memory);

        let mut cache = ZoneCache::new();
        cache.register(record(7, 0x1000));

        let first: Vec<u8> = cache
            .get_or_load(&counting, 7)
            .unwrap()
            .unwrap()
            .positions
            .clone();
        let reads_after_first = counting.reads();
        let second = cache.get_or_load(&counting, 7).unwrap().unwrap();
        assert_eq!(first, vec![1, 2, 3, 4]);
        assert_eq!(second.positions, first);
        assert_eq!(second.face_indices, vec![9, 10, 11, 12]);
        assert_eq!(counting.reads(), reads_after_first);
    }

    #[test]
    fn test_reregistration_keeps_the_later_descriptor() {
        let mut image = Image::new(0x1000);
        image.put(0x0, &[1, 1, 1, 1]);
        image.put(0x10, &[0; 4]);
        image.put(0x20, &[0; 4]);
        image.put(0x100, &[2, 2, 2, 2]);
        image.put(0x110, &[0; 4]);
        image.put(0x120, &[0; 4]);
        let memory = image.into_snapshot();

        let mut cache = ZoneCache::new();
        cache.register(record(7, 0x1000));
        cache.register(record(7, 0x1100));
        assert_eq!(cache.registered(), 1);
        let zone = cache.get_or_load(&memory, 7).unwrap().unwrap();
        assert_eq!(zone.positions, vec![2, 2, 2, 2]);
    }
}

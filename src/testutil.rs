//! Helpers for building synthetic target-memory images in tests.

use std::cell::Cell;

use crate::process::{MemoryError, ProcessMemory, SnapshotMemory};

/// Builder for one contiguous region of fake target memory. Offsets are
/// relative to the region base; [`Image::addr`] converts them to the
/// absolute addresses the extraction code works with.
pub(crate) struct Image {
    base: u64,
    bytes: Vec<u8>,
}

impl Image {
    pub fn new(base: u64) -> Self {
        Self { base, bytes: Vec::new() }
    }

    pub fn addr(&self, offset: u64) -> u64 {
        self.base + offset
    }

    pub fn put(&mut self, offset: u64, data: &[u8]) {
        let start = offset as usize;
        let end = start + data.len();
        if self.bytes.len() < end {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(data);
    }

    pub fn put_u16(&mut self, offset: u64, value: u16) {
        self.put(offset, &value.to_le_bytes());
    }

    pub fn put_u32(&mut self, offset: u64, value: u32) {
        self.put(offset, &value.to_le_bytes());
    }

    pub fn put_i32(&mut self, offset: u64, value: i32) {
        self.put(offset, &value.to_le_bytes());
    }

    pub fn put_u64(&mut self, offset: u64, value: u64) {
        self.put(offset, &value.to_le_bytes());
    }

    pub fn put_f32(&mut self, offset: u64, value: f32) {
        self.put(offset, &value.to_le_bytes());
    }

    pub fn put_cstr(&mut self, offset: u64, value: &str) {
        self.put(offset, value.as_bytes());
        self.put(offset + value.len() as u64, &[0]);
    }

    pub fn into_snapshot(self) -> SnapshotMemory {
        let mut memory = SnapshotMemory::new();
        memory.map_region(self.base, self.bytes);
        memory
    }
}

/// Wraps a snapshot and counts `read_bytes` calls, for asserting that caches
/// do not re-read.
pub(crate) struct CountingMemory<'a> {
    inner: &'a SnapshotMemory,
    reads: Cell<usize>,
}

impl<'a> CountingMemory<'a> {
    pub fn new(inner: &'a SnapshotMemory) -> Self {
        Self { inner, reads: Cell::new(0) }
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl ProcessMemory for CountingMemory<'_> {
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, MemoryError> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read_bytes(address, length)
    }
}

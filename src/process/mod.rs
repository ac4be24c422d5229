//! Access to a foreign process's address space.
//!
//! Everything downstream of this module reads the target through the
//! [`ProcessMemory`] trait using absolute addresses. Live-process backends are
//! provided by the embedding application; [`snapshot::SnapshotMemory`] covers
//! captured memory images and the test suite.

use thiserror::Error;

pub mod snapshot;

pub use snapshot::SnapshotMemory;

/// Longest C string any asset record is allowed to reference.
pub const MAX_CSTRING_LEN: usize = 4096;

/// Pointer width of the target image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtrWidth {
    Four,
    Eight,
}

impl PtrWidth {
    pub fn bytes(self) -> usize {
        match self {
            PtrWidth::Four => 4,
            PtrWidth::Eight => 8,
        }
    }
}

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("unmapped read of {length:#x} bytes at {address:#x}")]
    Unmapped { address: u64, length: usize },
    #[error("string at {address:#x} has no terminator within {limit} bytes")]
    UnterminatedString { address: u64, limit: usize },
    #[error("memory backend error: {0}")]
    Backend(#[from] std::io::Error),
}

pub trait ProcessMemory {
    /// Reads exactly `length` bytes starting at the absolute `address`.
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>, MemoryError>;

    fn read_array<const N: usize>(&self, address: u64) -> Result<[u8; N], MemoryError> {
        let bytes = self.read_bytes(address, N)?;
        bytes.try_into().map_err(|_| MemoryError::Unmapped {
            address,
            length: N,
        })
    }

    fn read_u8(&self, address: u64) -> Result<u8, MemoryError> {
        Ok(self.read_array::<1>(address)?[0])
    }

    fn read_u16(&self, address: u64) -> Result<u16, MemoryError> {
        Ok(u16::from_le_bytes(self.read_array(address)?))
    }

    fn read_u32(&self, address: u64) -> Result<u32, MemoryError> {
        Ok(u32::from_le_bytes(self.read_array(address)?))
    }

    fn read_i32(&self, address: u64) -> Result<i32, MemoryError> {
        Ok(i32::from_le_bytes(self.read_array(address)?))
    }

    fn read_u64(&self, address: u64) -> Result<u64, MemoryError> {
        Ok(u64::from_le_bytes(self.read_array(address)?))
    }

    fn read_f32(&self, address: u64) -> Result<f32, MemoryError> {
        Ok(f32::from_le_bytes(self.read_array(address)?))
    }

    /// Reads a pointer of the target's width, zero-extended to 64 bits.
    fn read_ptr(&self, address: u64, width: PtrWidth) -> Result<u64, MemoryError> {
        match width {
            PtrWidth::Four => Ok(self.read_u32(address)? as u64),
            PtrWidth::Eight => self.read_u64(address),
        }
    }

    /// Reads a NUL-terminated string, decoding as UTF-8 lossily.
    ///
    /// The default walks one byte at a time so a string ending just before an
    /// unmapped page still resolves. Backends with cheap range access should
    /// override this.
    fn read_cstring(&self, address: u64) -> Result<String, MemoryError> {
        let mut out = Vec::with_capacity(32);
        for i in 0..MAX_CSTRING_LEN as u64 {
            let byte = self.read_u8(address + i)?;
            if byte == 0 {
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
            out.push(byte);
        }
        Err(MemoryError::UnterminatedString {
            address,
            limit: MAX_CSTRING_LEN,
        })
    }
}

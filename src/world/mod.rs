//! Locating and reconstructing world geometry from the target process.

use variantly::Variantly;

use crate::error::RipResult;
use crate::process::{ProcessMemory, PtrWidth};

pub mod locator;
pub mod materials;
pub mod placements;
pub mod surfaces;
pub mod zones;

/// The located world-geometry asset with its per-generation source shape
/// resolved. Immutable for the rest of the run.
#[derive(Debug)]
pub struct WorldAsset {
    pub name: String,
    pub map_name: String,
    pub geometry: GeometrySource,
    pub placements: PlacementSource,
}

/// Where vertex and index data lives.
#[derive(Debug, Variantly)]
pub enum GeometrySource {
    /// Flat arrays owned by the asset record (legacy).
    Direct(DirectGeometry),
    /// Streamed through transient zones (next-gen).
    Zoned(ZonedGeometry),
}

#[derive(Debug)]
pub struct DirectGeometry {
    pub vertex_data: u64,
    pub vertex_count: u32,
    pub index_data: u64,
    pub index_count: u32,
    pub surface_table: u64,
    pub surface_count: u32,
}

#[derive(Debug)]
pub struct ZonedGeometry {
    pub surface_table: u64,
    pub surface_count: u32,
    pub surface_data_table: u64,
    pub surface_data_count: u32,
}

/// How placements resolve their model names.
#[derive(Debug, Variantly)]
pub enum PlacementSource {
    /// Model pointer inline in every record (legacy).
    Immediate { table: u64, count: u32 },
    /// Placeholder names back-filled through unique-model instance ranges
    /// (next-gen).
    Deferred {
        table: u64,
        count: u32,
        unique_model_table: u64,
        unique_model_count: u32,
        instance_range_table: u64,
        instance_range_count: u32,
    },
}

/// Strips the `*` wildcard prefix, any path, and the extension from an asset
/// name as stored in game memory.
pub(crate) fn clean_asset_name(raw: &str) -> String {
    let name = raw.strip_prefix('*').unwrap_or(raw);
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match name.rfind('.') {
        Some(dot) => name[..dot].to_owned(),
        None => name.to_owned(),
    }
}

/// Follows a name pointer stored at `ptr_addr`. A null pointer reads as an
/// empty name rather than an unmapped access.
pub(crate) fn read_name_at<R: ProcessMemory>(
    reader: &R,
    ptr_addr: u64,
    width: PtrWidth,
) -> RipResult<String> {
    let ptr = reader.read_ptr(ptr_addr, width)?;
    if ptr == 0 {
        return Ok(String::new());
    }
    Ok(reader.read_cstring(ptr)?)
}

/// Bulk-reads a record table, tolerating empty tables with null pointers.
pub(crate) fn read_table<R: ProcessMemory>(
    reader: &R,
    address: u64,
    count: usize,
    stride: usize,
) -> RipResult<Vec<u8>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    Ok(reader.read_bytes(address, count * stride)?)
}

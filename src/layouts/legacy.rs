//! Field tables for the legacy 32-bit layout.
//!
//! The world asset owns flat vertex and index arrays; surfaces carve ranges
//! out of them. All pointers are 4 bytes.

use crate::layouts::MaterialLayout;

/// Asset-pool table offsets, relative to the caller-supplied pool base.
pub struct PoolTable {
    /// Pointer to the model pool's first slot.
    pub models: u64,
    /// Name pointer inside a model slot.
    pub model_name: u64,
    /// World-geometry pool entry. The pool holds a single live record, so the
    /// entry is read directly rather than walked.
    pub world: u64,
}

pub const POOLS: PoolTable = PoolTable {
    models: 0x0C,
    model_name: 0x04,
    world: 0x40,
};

/// Names the first model asset carries in a supported target image. Anything
/// else means the attached process is not the expected game.
pub const IMAGE_MARKERS: [&str; 3] = ["void", "defaultactor", "defaultweapon"];

/// World-geometry asset record offsets (record size 0x2A0).
pub struct WorldAssetLayout {
    pub name_ptr: u64,
    pub map_name_ptr: u64,
    /// i32 count of 16-bit face indices.
    pub index_count: u64,
    pub index_data: u64,
    /// i32 surface count.
    pub surface_count: u64,
    /// i32 world vertex count.
    pub vertex_count: u64,
    pub vertex_data: u64,
    /// i32 placement count.
    pub placement_count: u64,
    pub surface_table: u64,
    pub placement_table: u64,
}

pub const WORLD_ASSET: WorldAssetLayout = WorldAssetLayout {
    name_ptr: 0x00,
    map_name_ptr: 0x04,
    index_count: 0x10,
    index_data: 0x14,
    surface_count: 0x18,
    vertex_count: 0x30,
    vertex_data: 0x34,
    placement_count: 0x258,
    surface_table: 0x294,
    placement_table: 0x29C,
};

/// Surface record stride. Fields: base vertex @0x04 (i32), vertex count @0x08
/// (u16), face count @0x0A (u16), base face element @0x0C (i32), material
/// pointer @0x10.
pub const SURFACE_STRIDE: usize = 0x30;

/// World vertex stride. Fields: position @0x00 (3 f32), UV @0x14 (2 f32),
/// packed normal @0x24 (u32).
pub const VERTEX_STRIDE: usize = 0x2C;

/// Placement record stride. Fields: origin @0x04 (3 f32), row-major rotation
/// matrix @0x10 (9 f32), scale @0x34 (f32), model pointer @0x38. The model's
/// name pointer sits at the start of the model record.
pub const PLACEMENT_STRIDE: usize = 0x4C;

pub const MATERIAL: MaterialLayout = MaterialLayout {
    name_ptr: 0x00,
    image_count: 0x3A,
    image_table: 0x44,
    image_stride: 12,
    image_semantic: 0x00,
    image_ref: 0x08,
    image_name_ptr: 0x20,
    diffuse_tag: 0xA0AB_1041,
};

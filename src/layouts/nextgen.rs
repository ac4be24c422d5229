//! Field tables for the next-gen 64-bit layout.
//!
//! Geometry is streamed: surfaces reference data blocks which in turn name a
//! transient zone owning the actual buffers. Asset pools are singly linked
//! lists with a declared capacity. All pointers are 8 bytes.

use crate::layouts::MaterialLayout;

/// Pool table offsets, relative to the caller-supplied pool base.
pub struct PoolTable {
    /// Size of one pool record.
    pub stride: u64,
    /// Pool index of the world-geometry assets.
    pub world_pool: u64,
    /// Pool index of the transient zones.
    pub zone_pool: u64,
    /// Pointer to the first list node inside a pool record.
    pub first_node: u64,
    /// u32 declared capacity inside a pool record. Bounds every list walk.
    pub capacity: u64,
}

pub const POOLS: PoolTable = PoolTable {
    stride: 0x20,
    world_pool: 31,
    zone_pool: 32,
    first_node: 0x00,
    capacity: 0x10,
};

/// Pool list node offsets.
pub struct AssetNodeLayout {
    /// Pointer to the asset record itself.
    pub record: u64,
    /// Pointer to the next node, null at the tail.
    pub next: u64,
    /// Pointer to the asset's name string.
    pub name_ptr: u64,
}

pub const ASSET_NODE: AssetNodeLayout = AssetNodeLayout {
    record: 0x00,
    next: 0x10,
    name_ptr: 0x28,
};

/// World-geometry asset record offsets.
pub struct WorldAssetLayout {
    pub name_ptr: u64,
    pub map_name_ptr: u64,
    /// u32 surface count.
    pub surface_count: u64,
    /// u32 surface-data-block count.
    pub surface_data_count: u64,
    pub surface_table: u64,
    pub surface_data_table: u64,
    /// u32 unique-model count.
    pub unique_model_count: u64,
    /// u32 placement count.
    pub placement_count: u64,
    pub unique_model_table: u64,
    pub placement_table: u64,
    /// u32 instance-range count.
    pub instance_range_count: u64,
    pub instance_range_table: u64,
}

pub const WORLD_ASSET: WorldAssetLayout = WorldAssetLayout {
    name_ptr: 0x00,
    map_name_ptr: 0x08,
    surface_count: 0x10,
    surface_data_count: 0x14,
    surface_table: 0x18,
    surface_data_table: 0x20,
    unique_model_count: 0x28,
    placement_count: 0x2C,
    unique_model_table: 0x30,
    placement_table: 0x38,
    instance_range_count: 0x40,
    instance_range_table: 0x48,
};

/// Transient-zone record offsets.
pub struct ZoneLayout {
    pub name_ptr: u64,
    /// u32 zone index, the key surfaces reference.
    pub index: u64,
    /// Quantized vertex positions, one u64 per vertex.
    pub positions_ptr: u64,
    /// u32 size of the positions buffer in bytes.
    pub positions_size: u64,
    /// Interleaved draw data (tangent frames, UV layers).
    pub draw_data_ptr: u64,
    /// u32 size of the draw-data buffer in bytes.
    pub draw_data_size: u64,
    /// 16-bit face indices.
    pub face_indices_ptr: u64,
    /// u32 count of face-index elements (buffer is count * 2 bytes).
    pub face_index_count: u64,
}

pub const ZONE: ZoneLayout = ZoneLayout {
    name_ptr: 0x00,
    index: 0x08,
    positions_ptr: 0x10,
    positions_size: 0x18,
    draw_data_ptr: 0x20,
    draw_data_size: 0x28,
    face_indices_ptr: 0x30,
    face_index_count: 0x38,
};

/// Surface record stride. Fields: data-block index @0x00 (u32), material
/// pointer @0x08 (u64), vertex count @0x10 (u16), face count @0x12 (u16),
/// base face element @0x14 (u32).
pub const SURFACE_STRIDE: usize = 0x28;

/// Surface data block stride. Fields: zone index @0x00, layer count @0x04,
/// positions offset @0x08, tangent-frame offset @0x0C, UV offset @0x10
/// (all u32; offsets are bytes into the owning zone's buffers).
pub const SURFACE_DATA_STRIDE: usize = 0x20;

/// Placement record stride. Fields: packed position @0x00 (3 i32), packed
/// quaternion @0x0C (4 u16, memory order z/x/y/w), scale @0x14 (f32).
pub const PLACEMENT_STRIDE: usize = 0x20;

/// Unique-model record stride; the model pointer sits at offset 0 and the
/// model's name pointer at the start of the model record.
pub const UNIQUE_MODEL_STRIDE: usize = 0x18;

/// Instance-range record stride. Fields: unique-model index, first instance,
/// instance count (3 u32).
pub const INSTANCE_RANGE_STRIDE: usize = 0x0C;

/// World vertex position quantization: 21-bit axis fields mapped through
/// `field * SCALE + OFFSET`.
pub const POSITION_SCALE: f32 = 1.0 / 256.0;
pub const POSITION_OFFSET: f32 = -4096.0;

/// Placement position quantization for the packed i32 axes.
pub const PLACEMENT_POSITION_SCALE: f32 = 1.0 / 4096.0;

pub const MATERIAL: MaterialLayout = MaterialLayout {
    name_ptr: 0x00,
    image_count: 0x10,
    image_table: 0x18,
    image_stride: 16,
    image_semantic: 0x00,
    image_ref: 0x08,
    image_name_ptr: 0x00,
    diffuse_tag: 0,
};

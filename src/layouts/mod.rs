//! Per-version record layouts, kept as data.
//!
//! Both engine generations expose the same logical records (world asset,
//! surface, material, placement) behind different field offsets, strides, and
//! pointer widths. The offsets live in [`legacy`] and [`nextgen`] as plain
//! constant tables so the decode paths stay shared; nothing in the crate
//! overlays `#[repr(C)]` structs on foreign memory.

use crate::process::PtrWidth;

pub mod legacy;
pub mod nextgen;

/// Which engine generation the target process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, variantly::Variantly)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Generation {
    /// 32-bit layout: flat vertex/index arrays owned by the world asset.
    Legacy,
    /// 64-bit layout: geometry streamed through transient zones.
    NextGen,
}

impl Generation {
    pub fn ptr_width(self) -> PtrWidth {
        match self {
            Generation::Legacy => PtrWidth::Four,
            Generation::NextGen => PtrWidth::Eight,
        }
    }

    pub fn material(self) -> &'static MaterialLayout {
        match self {
            Generation::Legacy => &legacy::MATERIAL,
            Generation::NextGen => &nextgen::MATERIAL,
        }
    }
}

/// Material record offsets. The record shape is shared across generations;
/// only the numbers differ.
#[derive(Debug)]
pub struct MaterialLayout {
    /// Pointer to the material's name string.
    pub name_ptr: u64,
    /// u8 count of image-table entries.
    pub image_count: u64,
    /// Pointer to the image table.
    pub image_table: u64,
    /// Size of one image-table entry.
    pub image_stride: u64,
    /// u32 semantic tag inside an entry.
    pub image_semantic: u64,
    /// Pointer to the image record inside an entry.
    pub image_ref: u64,
    /// Pointer to the image's name string, relative to the image record.
    pub image_name_ptr: u64,
    /// Semantic tag marking the diffuse/albedo slot.
    pub diffuse_tag: u32,
}

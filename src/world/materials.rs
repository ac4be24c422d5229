//! Material records and diffuse-texture resolution.

use std::collections::HashMap;

use crate::error::RipResult;
use crate::layouts::Generation;
use crate::process::ProcessMemory;
use crate::world::{clean_asset_name, read_name_at};

/// A resolved material, before any per-surface layer collapse.
#[derive(Debug, Clone)]
pub struct ResolvedMaterial {
    pub name: String,
    pub diffuse: Option<String>,
}

/// Resolves material records, cached by address for the run. Surfaces share
/// materials heavily and the records are immutable while a map is loaded.
#[derive(Debug, Default)]
pub struct MaterialResolver {
    cache: HashMap<u64, ResolvedMaterial>,
}

impl MaterialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve<R: ProcessMemory>(
        &mut self,
        reader: &R,
        generation: Generation,
        address: u64,
    ) -> RipResult<ResolvedMaterial> {
        if let Some(hit) = self.cache.get(&address) {
            return Ok(hit.clone());
        }
        let resolved = resolve_uncached(reader, generation, address)?;
        self.cache.insert(address, resolved.clone());
        Ok(resolved)
    }
}

fn resolve_uncached<R: ProcessMemory>(
    reader: &R,
    generation: Generation,
    address: u64,
) -> RipResult<ResolvedMaterial> {
    let layout = generation.material();
    let width = generation.ptr_width();

    let raw_name = read_name_at(reader, address + layout.name_ptr, width)?;
    let name = clean_asset_name(&raw_name);

    let image_count = reader.read_u8(address + layout.image_count)?;
    let table = reader.read_ptr(address + layout.image_table, width)?;
    let mut diffuse = None;
    if table != 0 {
        for i in 0..image_count as u64 {
            let entry = table + i * layout.image_stride;
            if reader.read_u32(entry + layout.image_semantic)? != layout.diffuse_tag {
                continue;
            }
            let image = reader.read_ptr(entry + layout.image_ref, width)?;
            if image == 0 {
                continue;
            }
            let raw = read_name_at(reader, image + layout.image_name_ptr, width)?;
            if raw.is_empty() {
                continue;
            }
            // First usable diffuse slot wins.
            diffuse = Some(clean_asset_name(&raw));
            break;
        }
    }
    Ok(ResolvedMaterial { name, diffuse })
}

/// Collapses a multi-layer material name to its leading segment, the base
/// name shared by the layered variants.
pub fn collapse_layered_name(name: &str) -> &str {
    name.split('_').next().unwrap_or(name)
}

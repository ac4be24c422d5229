//! Finding the live world asset and resident zones in the target process.

use tracing::debug;

use crate::error::{ErrorKind, RipResult, failure_from_kind};
use crate::layouts::{Generation, legacy, nextgen};
use crate::process::{ProcessMemory, PtrWidth};
use crate::world::zones::{ZoneCache, ZoneRecord};
use crate::world::{
    DirectGeometry, GeometrySource, PlacementSource, WorldAsset, ZonedGeometry, read_name_at,
};

/// Result of looking for a loaded map.
// Not a variantly derive: it would emit `is_not_loaded` for both variants.
#[derive(Debug)]
pub enum Locate {
    Loaded(Box<WorldAsset>),
    /// The target is running but holds no world asset.
    NotLoaded,
}

impl Locate {
    pub fn is_not_loaded(&self) -> bool {
        matches!(self, Locate::NotLoaded)
    }
}

/// Probes the legacy image marker: the first model asset of a supported
/// build carries one of a few known placeholder names. A probe read landing
/// in unmapped memory also fails validation.
pub fn verify_legacy_image<R: ProcessMemory>(reader: &R, pools: u64) -> bool {
    let width = PtrWidth::Four;
    let probe = || -> RipResult<String> {
        let model_pool = reader.read_ptr(pools + legacy::POOLS.models, width)?;
        Ok(read_name_at(reader, model_pool + legacy::POOLS.model_name, width)?)
    };
    match probe() {
        Ok(name) => legacy::IMAGE_MARKERS.contains(&name.as_str()),
        Err(_) => false,
    }
}

/// Locates the world-geometry asset for the given generation.
pub fn locate<R: ProcessMemory>(
    reader: &R,
    pools: u64,
    generation: Generation,
) -> RipResult<Locate> {
    match generation {
        Generation::Legacy => locate_legacy(reader, pools),
        Generation::NextGen => locate_nextgen(reader, pools),
    }
}

fn locate_legacy<R: ProcessMemory>(reader: &R, pools: u64) -> RipResult<Locate> {
    let width = PtrWidth::Four;
    let record = reader.read_ptr(pools + legacy::POOLS.world, width)?;
    if record == 0 {
        return Ok(Locate::NotLoaded);
    }

    let layout = &legacy::WORLD_ASSET;
    let name = read_name_at(reader, record + layout.name_ptr, width)?;
    if name.trim().is_empty() {
        return Ok(Locate::NotLoaded);
    }
    let map_name = read_name_at(reader, record + layout.map_name_ptr, width)?;

    let index_count = read_count(reader.read_i32(record + layout.index_count)?, "face index")?;
    let surface_count = read_count(reader.read_i32(record + layout.surface_count)?, "surface")?;
    let vertex_count = read_count(reader.read_i32(record + layout.vertex_count)?, "vertex")?;
    let placement_count =
        read_count(reader.read_i32(record + layout.placement_count)?, "placement")?;

    let geometry = GeometrySource::Direct(DirectGeometry {
        vertex_data: reader.read_ptr(record + layout.vertex_data, width)?,
        vertex_count,
        index_data: reader.read_ptr(record + layout.index_data, width)?,
        index_count,
        surface_table: reader.read_ptr(record + layout.surface_table, width)?,
        surface_count,
    });
    let placements = PlacementSource::Immediate {
        table: reader.read_ptr(record + layout.placement_table, width)?,
        count: placement_count,
    };
    debug!(%name, %map_name, surface_count, vertex_count, "located world asset");
    Ok(Locate::Loaded(Box::new(WorldAsset { name, map_name, geometry, placements })))
}

fn locate_nextgen<R: ProcessMemory>(reader: &R, pools: u64) -> RipResult<Locate> {
    let width = PtrWidth::Eight;
    let nodes = walk_pool(reader, pools, nextgen::POOLS.world_pool)?;
    // The pool front-fills with stale assets from earlier maps; the last
    // valid node is the live one.
    let Some(node) = nodes.last() else {
        return Ok(Locate::NotLoaded);
    };

    let layout = &nextgen::WORLD_ASSET;
    let record = node.record;
    let map_name = read_name_at(reader, record + layout.map_name_ptr, width)?;
    if map_name.trim().is_empty() {
        return Ok(Locate::NotLoaded);
    }

    let geometry = GeometrySource::Zoned(ZonedGeometry {
        surface_table: reader.read_ptr(record + layout.surface_table, width)?,
        surface_count: reader.read_u32(record + layout.surface_count)?,
        surface_data_table: reader.read_ptr(record + layout.surface_data_table, width)?,
        surface_data_count: reader.read_u32(record + layout.surface_data_count)?,
    });
    let placements = PlacementSource::Deferred {
        table: reader.read_ptr(record + layout.placement_table, width)?,
        count: reader.read_u32(record + layout.placement_count)?,
        unique_model_table: reader.read_ptr(record + layout.unique_model_table, width)?,
        unique_model_count: reader.read_u32(record + layout.unique_model_count)?,
        instance_range_table: reader.read_ptr(record + layout.instance_range_table, width)?,
        instance_range_count: reader.read_u32(record + layout.instance_range_count)?,
    };
    debug!(name = %node.name, %map_name, "located world asset");
    Ok(Locate::Loaded(Box::new(WorldAsset {
        name: node.name.clone(),
        map_name,
        geometry,
        placements,
    })))
}

/// One walked pool node.
#[derive(Debug)]
pub struct PoolNode {
    pub record: u64,
    pub name: String,
}

/// Walks a next-gen asset pool's linked list, bounded by the pool's declared
/// capacity so a corrupt next pointer cannot loop forever. Nodes without a
/// record or a name are skipped but still advance the walk.
pub fn walk_pool<R: ProcessMemory>(
    reader: &R,
    pools: u64,
    pool_index: u64,
) -> RipResult<Vec<PoolNode>> {
    let width = PtrWidth::Eight;
    let pool = pools + nextgen::POOLS.stride * pool_index;
    let mut node = reader.read_ptr(pool + nextgen::POOLS.first_node, width)?;
    let mut remaining = reader.read_u32(pool + nextgen::POOLS.capacity)?;

    let mut nodes = Vec::new();
    while node != 0 && remaining > 0 {
        remaining -= 1;
        let record = reader.read_ptr(node + nextgen::ASSET_NODE.record, width)?;
        let name = read_name_at(reader, node + nextgen::ASSET_NODE.name_ptr, width)?;
        if record != 0 && !name.trim().is_empty() {
            nodes.push(PoolNode { record, name });
        }
        node = reader.read_ptr(node + nextgen::ASSET_NODE.next, width)?;
    }
    Ok(nodes)
}

/// Walks the zone pool and registers every resident zone with the cache.
/// Returns how many descriptors were accepted.
pub fn register_zones<R: ProcessMemory>(
    reader: &R,
    pools: u64,
    cache: &mut ZoneCache,
) -> RipResult<usize> {
    let width = PtrWidth::Eight;
    let layout = &nextgen::ZONE;
    let before = cache.registered();
    for node in walk_pool(reader, pools, nextgen::POOLS.zone_pool)? {
        let record = node.record;
        cache.register(ZoneRecord {
            name: node.name,
            index: reader.read_u32(record + layout.index)?,
            positions_ptr: reader.read_ptr(record + layout.positions_ptr, width)?,
            positions_size: reader.read_u32(record + layout.positions_size)?,
            draw_data_ptr: reader.read_ptr(record + layout.draw_data_ptr, width)?,
            draw_data_size: reader.read_u32(record + layout.draw_data_size)?,
            face_indices_ptr: reader.read_ptr(record + layout.face_indices_ptr, width)?,
            face_index_count: reader.read_u32(record + layout.face_index_count)?,
        });
    }
    Ok(cache.registered() - before)
}

fn read_count(value: i32, what: &'static str) -> RipResult<u32> {
    u32::try_from(value)
        .map_err(|_| failure_from_kind(ErrorKind::NegativeCount { what, value: value as i64 }))
}

//! The extraction pipeline: locate, decode, and write one loaded map.

use std::path::{Path, PathBuf};
use std::time::Instant;

use bon::Builder;
use tracing::{debug, info};
use variantly::Variantly;

use crate::error::RipResult;
use crate::layouts::Generation;
use crate::output::{MapEntities, MapWriter, MeshBuffers, MeshWriter, texture_search_line};
use crate::process::ProcessMemory;
use crate::world::locator::{self, Locate};
use crate::world::surfaces::{self, SurfaceRecord, VertexPass};
use crate::world::zones::ZoneCache;
use crate::world::{GeometrySource, placements};

/// Pipeline phases in execution order. [`Phase::Unsupported`] is terminal
/// and only reachable before geometry work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    Located,
    ZonesLoaded,
    VerticesDecoded,
    MaterialsResolved,
    FacesBuilt,
    PlacementsResolved,
    Written,
    Done,
    Unsupported,
}

struct PhaseTracker {
    phase: Phase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.phase);
        debug!(from = ?self.phase, to = ?next, "phase");
        self.phase = next;
    }
}

/// Why a run ended with nothing written.
#[derive(Debug, Clone, PartialEq, Eq, Variantly)]
pub enum UnsupportedReason {
    /// The attached process failed the image validation probe.
    WrongImage,
    /// The target is running but no map is loaded.
    NoMapLoaded,
    /// The map declares more vertices than a mesh index can address.
    MapTooLarge { declared_vertices: u64 },
}

impl std::fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongImage => write!(f, "target process failed image validation"),
            Self::NoMapLoaded => write!(f, "no map is loaded"),
            Self::MapTooLarge { declared_vertices } => {
                write!(f, "map declares {declared_vertices} vertices, beyond the index range")
            }
        }
    }
}

/// Result of a completed run. `Unsupported` is an outcome, not an error:
/// the target was readable but cannot produce output.
#[derive(Debug, Variantly)]
pub enum Outcome {
    Extracted(ExtractionSummary),
    Unsupported(UnsupportedReason),
}

/// Counts reported after a successful run.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractionSummary {
    pub asset_name: String,
    pub map_name: String,
    pub surfaces: usize,
    pub skipped_surfaces: usize,
    pub missing_zones: Vec<u32>,
    pub vertices: usize,
    pub faces: usize,
    pub degenerate_faces: usize,
    pub materials: usize,
    pub entities: usize,
}

/// Caller-tunable run options.
#[derive(Builder, Debug, Clone)]
pub struct ExtractOptions {
    /// Asset-pool table address inside the target.
    pools_address: u64,
    generation: Generation,
    /// Extension-less output path handed to the writers.
    output_stem: PathBuf,
    /// Also write `<stem>_search_string.txt` next to the mesh. On by
    /// default.
    write_search_list: Option<bool>,
}

impl ExtractOptions {
    pub fn pools_address(&self) -> u64 {
        self.pools_address
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn output_stem(&self) -> &Path {
        &self.output_stem
    }

    pub fn write_search_list(&self) -> bool {
        self.write_search_list.unwrap_or(true)
    }
}

/// Runs the whole pipeline against `reader`, driving the writers on success.
///
/// `progress` receives one human-readable line per milestone. Fatal decode
/// errors abort before anything is written; an [`Outcome::Unsupported`] run
/// writes nothing either.
pub fn run_extraction<R, F>(
    reader: &R,
    options: &ExtractOptions,
    mesh_writer: &mut dyn MeshWriter,
    map_writer: &mut dyn MapWriter,
    mut progress: F,
) -> RipResult<Outcome>
where
    R: ProcessMemory,
    F: FnMut(&str),
{
    let started = Instant::now();
    let mut tracker = PhaseTracker::new();
    let generation = options.generation();
    let pools = options.pools_address();

    if generation.is_legacy() && !locator::verify_legacy_image(reader, pools) {
        tracker.advance(Phase::Unsupported);
        progress("Target process failed validation");
        return Ok(Outcome::Unsupported(UnsupportedReason::WrongImage));
    }

    let asset = match locator::locate(reader, pools, generation)? {
        Locate::Loaded(asset) => asset,
        Locate::NotLoaded => {
            tracker.advance(Phase::Unsupported);
            progress("No map is loaded");
            return Ok(Outcome::Unsupported(UnsupportedReason::NoMapLoaded));
        }
    };
    tracker.advance(Phase::Located);
    progress(&format!("Found {} ({})", asset.name, asset.map_name));
    info!(name = %asset.name, map = %asset.map_name, "located world asset");

    let (surface_records, blocks) = surfaces::read_surfaces(reader, &asset.geometry)?;
    let declared = declared_vertex_total(&asset.geometry, &surface_records);
    if declared > u32::MAX as u64 {
        tracker.advance(Phase::Unsupported);
        progress(&format!("Map declares {declared} vertices, unsupported"));
        return Ok(Outcome::Unsupported(UnsupportedReason::MapTooLarge {
            declared_vertices: declared,
        }));
    }

    let mut zones = ZoneCache::new();
    if generation.is_next_gen() {
        let registered = locator::register_zones(reader, pools, &mut zones)?;
        progress(&format!("{registered} zones resident"));
    }
    tracker.advance(Phase::ZonesLoaded);

    let mut mesh = MeshBuffers::new();
    let stage = Instant::now();
    let VertexPass { mut plans, missing_zones } = surfaces::decode_vertices(
        reader,
        &asset.geometry,
        &surface_records,
        &blocks,
        &mut zones,
        &mut mesh,
    )?;
    tracker.advance(Phase::VerticesDecoded);
    progress(&format!("Decoded {} vertices in {:.2?}", mesh.vertex_count(), stage.elapsed()));

    let textures = surfaces::resolve_materials(reader, generation, &mut plans, &mut mesh)?;
    tracker.advance(Phase::MaterialsResolved);
    progress(&format!("Resolved {} materials", mesh.materials.len()));

    let stage = Instant::now();
    let degenerate_faces =
        surfaces::build_faces(reader, &asset.geometry, &plans, &mut zones, &mut mesh)?;
    tracker.advance(Phase::FacesBuilt);
    progress(&format!("Built {} faces in {:.2?}", mesh.faces.len(), stage.elapsed()));

    let entities = placements::reconstruct(reader, &asset.placements)?;
    tracker.advance(Phase::PlacementsResolved);
    progress(&format!("Recovered {} placements", entities.len()));

    let map = MapEntities { map_name: asset.map_name.clone(), entities };
    mesh_writer.save(&mesh, options.output_stem())?;
    if options.write_search_list() {
        let line = texture_search_line(textures.iter().map(String::as_str));
        std::fs::write(search_list_path(options.output_stem()), line)?;
    }
    map_writer.save(&map, options.output_stem())?;
    tracker.advance(Phase::Written);
    progress(&format!("Wrote {}", options.output_stem().display()));

    let summary = ExtractionSummary {
        asset_name: asset.name.clone(),
        map_name: asset.map_name.clone(),
        surfaces: plans.len(),
        skipped_surfaces: plans.iter().filter(|p| !p.emitted).count(),
        missing_zones,
        vertices: mesh.vertex_count(),
        faces: mesh.faces.len(),
        degenerate_faces,
        materials: mesh.materials.len(),
        entities: map.entities.len(),
    };
    tracker.advance(Phase::Done);
    progress(&format!("Done in {:.2?}", started.elapsed()));
    Ok(Outcome::Extracted(summary))
}

/// Total vertices the map claims before any decoding. Legacy declares one
/// array; zoned maps declare per surface.
fn declared_vertex_total(geometry: &GeometrySource, surfaces: &[SurfaceRecord]) -> u64 {
    match geometry {
        GeometrySource::Direct(geo) => geo.vertex_count as u64,
        GeometrySource::Zoned(_) => {
            surfaces.iter().map(|s| s.vertex_count as u64).sum()
        }
    }
}

fn search_list_path(stem: &Path) -> PathBuf {
    let mut name = stem.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push("_search_string.txt");
    stem.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layouts::{legacy, nextgen};
    use crate::testutil::Image;

    #[derive(Default)]
    struct RecordingMeshWriter {
        saved: Option<(MeshBuffers, PathBuf)>,
    }

    impl MeshWriter for RecordingMeshWriter {
        fn save(&mut self, mesh: &MeshBuffers, stem: &Path) -> RipResult<()> {
            self.saved = Some((mesh.clone(), stem.to_path_buf()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingMapWriter {
        saved: Option<MapEntities>,
    }

    impl MapWriter for RecordingMapWriter {
        fn save(&mut self, map: &MapEntities, _stem: &Path) -> RipResult<()> {
            self.saved = Some(map.clone());
            Ok(())
        }
    }

    fn options(generation: Generation, pools: u64, stem: PathBuf) -> ExtractOptions {
        ExtractOptions::builder()
            .pools_address(pools)
            .generation(generation)
            .output_stem(stem)
            .build()
    }

    /// Complete legacy image: marker model, four vertices, one surface with
    /// one real and one degenerate face, an untextured material, and one
    /// placement.
    fn legacy_world() -> Image {
        let mut image = Image::new(0x40_0000);
        image.put_u32(legacy::POOLS.models, image.addr(0x1_0000) as u32);
        image.put_u32(0x1_0000 + legacy::POOLS.model_name, image.addr(0x1_0100) as u32);
        image.put_cstr(0x1_0100, "void");

        let world = 0x2_0000u64;
        image.put_u32(legacy::POOLS.world, image.addr(world) as u32);
        image.put_u32(world + legacy::WORLD_ASSET.name_ptr, image.addr(0x2_2000) as u32);
        image.put_cstr(0x2_2000, "maps/mp_test");
        image.put_u32(world + legacy::WORLD_ASSET.map_name_ptr, image.addr(0x2_2100) as u32);
        image.put_cstr(0x2_2100, "mp_test");
        image.put_i32(world + legacy::WORLD_ASSET.index_count, 6);
        image.put_u32(world + legacy::WORLD_ASSET.index_data, image.addr(0x3_0000) as u32);
        image.put_i32(world + legacy::WORLD_ASSET.surface_count, 1);
        image.put_i32(world + legacy::WORLD_ASSET.vertex_count, 4);
        image.put_u32(world + legacy::WORLD_ASSET.vertex_data, image.addr(0x3_1000) as u32);
        image.put_i32(world + legacy::WORLD_ASSET.placement_count, 1);
        image.put_u32(world + legacy::WORLD_ASSET.surface_table, image.addr(0x3_2000) as u32);
        image.put_u32(world + legacy::WORLD_ASSET.placement_table, image.addr(0x3_3000) as u32);

        for (slot, value) in [0u16, 1, 2, 3, 3, 2].into_iter().enumerate() {
            image.put_u16(0x3_0000 + slot as u64 * 2, value);
        }
        for i in 0..4u64 {
            let vertex = 0x3_1000 + i * legacy::VERTEX_STRIDE as u64;
            image.put_f32(vertex, i as f32);
            image.put_f32(vertex + 0x14, 0.25);
            image.put_f32(vertex + 0x18, 0.75);
            image.put(vertex + 0x24, &[255, 128, 128, 0]);
            image.put(vertex + legacy::VERTEX_STRIDE as u64 - 1, &[0]);
        }
        let surface = 0x3_2000u64;
        image.put_u16(surface + 0x08, 4);
        image.put_u16(surface + 0x0A, 2);
        image.put_u32(surface + 0x10, image.addr(0x3_4000) as u32);
        image.put(surface + legacy::SURFACE_STRIDE as u64 - 1, &[0]);

        let material = 0x3_4000u64;
        image.put_u32(material + legacy::MATERIAL.name_ptr, image.addr(0x3_4100) as u32);
        image.put_cstr(0x3_4100, "*floor_concrete.mtl");
        image.put(material + legacy::MATERIAL.image_count, &[1]);
        image.put_u32(material + legacy::MATERIAL.image_table, image.addr(0x3_4200) as u32);
        // Not the diffuse semantic, so the material stays untextured.
        image.put_u32(0x3_4200 + legacy::MATERIAL.image_semantic, 0x1111_1111);
        image.put_u32(0x3_4200 + legacy::MATERIAL.image_ref, 0);

        let placement = 0x3_3000u64;
        image.put_f32(placement + 0x04, 10.0);
        image.put_f32(placement + 0x08, 20.0);
        image.put_f32(placement + 0x0C, 30.0);
        for cell in [0u64, 4, 8] {
            image.put_f32(placement + 0x10 + cell * 4, 1.0);
        }
        image.put_f32(placement + 0x34, 1.5);
        image.put_u32(placement + 0x38, image.addr(0x3_5000) as u32);
        image.put(placement + legacy::PLACEMENT_STRIDE as u64 - 1, &[0]);
        image.put_u32(0x3_5000, image.addr(0x3_5100) as u32);
        image.put_cstr(0x3_5100, "static/crate_wood");
        image
    }

    #[test]
    fn test_legacy_extraction_end_to_end() {
        let memory = legacy_world().into_snapshot();
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("mp_test");
        let options = options(Generation::Legacy, 0x40_0000, stem.clone());
        let mut mesh_writer = RecordingMeshWriter::default();
        let mut map_writer = RecordingMapWriter::default();
        let mut lines = Vec::new();

        let outcome = run_extraction(&memory, &options, &mut mesh_writer, &mut map_writer, |s| {
            lines.push(s.to_owned())
        })
        .unwrap();

        let summary = outcome.extracted().unwrap();
        assert_eq!(summary.asset_name, "maps/mp_test");
        assert_eq!(summary.map_name, "mp_test");
        assert_eq!(summary.vertices, 4);
        assert_eq!(summary.faces, 1);
        assert_eq!(summary.degenerate_faces, 1);
        assert_eq!(summary.materials, 1);
        assert_eq!(summary.entities, 1);
        assert_eq!(summary.skipped_surfaces, 0);
        assert!(summary.missing_zones.is_empty());

        let (mesh, saved_stem) = mesh_writer.saved.unwrap();
        assert_eq!(saved_stem, stem);
        assert_eq!(mesh.faces[0].indices, [0, 2, 1]);
        assert_eq!(mesh.uvs[0], [0.25, 0.25]);
        assert_eq!(mesh.materials[0].name, "floor_concrete");
        assert!(mesh.materials[0].diffuse.is_none());

        let map = map_writer.saved.unwrap();
        assert_eq!(map.map_name, "mp_test");
        assert_eq!(map.entities[0].model, "static/crate_wood");
        assert_eq!(map.entities[0].origin, [10.0, 20.0, 30.0]);
        assert_eq!(map.entities[0].scale, 1.5);

        // No diffuse textures resolved, so the search list is present but
        // empty.
        let search = std::fs::read_to_string(dir.path().join("mp_test_search_string.txt")).unwrap();
        assert_eq!(search, "");
        assert!(lines.first().unwrap().contains("mp_test"));
    }

    #[test]
    fn test_search_list_can_be_disabled() {
        let memory = legacy_world().into_snapshot();
        let dir = tempfile::tempdir().unwrap();
        let options = ExtractOptions::builder()
            .pools_address(0x40_0000)
            .generation(Generation::Legacy)
            .output_stem(dir.path().join("mp_test"))
            .write_search_list(false)
            .build();
        let mut mesh_writer = RecordingMeshWriter::default();
        let mut map_writer = RecordingMapWriter::default();
        run_extraction(&memory, &options, &mut mesh_writer, &mut map_writer, |_| {}).unwrap();
        assert!(!dir.path().join("mp_test_search_string.txt").exists());
        assert!(mesh_writer.saved.is_some());
    }

    #[test]
    fn test_wrong_image_is_unsupported() {
        let mut image = legacy_world();
        image.put_cstr(0x1_0100, "notepad");
        let memory = image.into_snapshot();
        let dir = tempfile::tempdir().unwrap();
        let options = options(Generation::Legacy, 0x40_0000, dir.path().join("out"));
        let mut mesh_writer = RecordingMeshWriter::default();
        let mut map_writer = RecordingMapWriter::default();
        let outcome =
            run_extraction(&memory, &options, &mut mesh_writer, &mut map_writer, |_| {}).unwrap();
        assert_eq!(outcome.unsupported().unwrap(), UnsupportedReason::WrongImage);
        assert!(mesh_writer.saved.is_none());
        assert!(map_writer.saved.is_none());
    }

    #[test]
    fn test_no_world_asset_is_unsupported() {
        let mut image = legacy_world();
        image.put_u32(legacy::POOLS.world, 0);
        let memory = image.into_snapshot();
        let dir = tempfile::tempdir().unwrap();
        let options = options(Generation::Legacy, 0x40_0000, dir.path().join("out"));
        let mut mesh_writer = RecordingMeshWriter::default();
        let mut map_writer = RecordingMapWriter::default();
        let outcome =
            run_extraction(&memory, &options, &mut mesh_writer, &mut map_writer, |_| {}).unwrap();
        assert_eq!(outcome.unsupported().unwrap(), UnsupportedReason::NoMapLoaded);
        assert!(mesh_writer.saved.is_none());
    }

    fn put_nextgen_node(image: &mut Image, node: u64, record: u64, name_at: u64, name: &str) {
        image.put_u64(node + nextgen::ASSET_NODE.record, image.addr(record));
        image.put_u64(node + nextgen::ASSET_NODE.name_ptr, image.addr(name_at));
        image.put_cstr(name_at, name);
    }

    /// Complete next-gen image: one world asset, one resident zone (7) plus a
    /// missing one (9), three surfaces with layered materials, six placements
    /// back-filled through one instance range.
    fn nextgen_world() -> Image {
        let mut image = Image::new(0x1_0000_0000);

        let world_pool = nextgen::POOLS.stride * nextgen::POOLS.world_pool;
        image.put_u64(world_pool + nextgen::POOLS.first_node, image.addr(0x1000));
        image.put_u32(world_pool + nextgen::POOLS.capacity, 4);
        put_nextgen_node(&mut image, 0x1000, 0x3000, 0x1100, "mp_small");

        let zone_pool = nextgen::POOLS.stride * nextgen::POOLS.zone_pool;
        image.put_u64(zone_pool + nextgen::POOLS.first_node, image.addr(0x2000));
        image.put_u32(zone_pool + nextgen::POOLS.capacity, 4);
        put_nextgen_node(&mut image, 0x2000, 0x3100, 0x1200, "zone_a");

        let world = 0x3000u64;
        image.put_u64(world + nextgen::WORLD_ASSET.map_name_ptr, image.addr(0x1100));
        image.put_u32(world + nextgen::WORLD_ASSET.surface_count, 3);
        image.put_u32(world + nextgen::WORLD_ASSET.surface_data_count, 3);
        image.put_u64(world + nextgen::WORLD_ASSET.surface_table, image.addr(0x4000));
        image.put_u64(world + nextgen::WORLD_ASSET.surface_data_table, image.addr(0x4100));
        image.put_u32(world + nextgen::WORLD_ASSET.unique_model_count, 2);
        image.put_u32(world + nextgen::WORLD_ASSET.placement_count, 6);
        image.put_u64(world + nextgen::WORLD_ASSET.unique_model_table, image.addr(0x4200));
        image.put_u64(world + nextgen::WORLD_ASSET.placement_table, image.addr(0x4300));
        image.put_u32(world + nextgen::WORLD_ASSET.instance_range_count, 1);
        image.put_u64(world + nextgen::WORLD_ASSET.instance_range_table, image.addr(0x4400));

        let zone = 0x3100u64;
        image.put_u32(zone + nextgen::ZONE.index, 7);
        image.put_u64(zone + nextgen::ZONE.positions_ptr, image.addr(0x5000));
        image.put_u32(zone + nextgen::ZONE.positions_size, 48);
        image.put_u64(zone + nextgen::ZONE.draw_data_ptr, image.addr(0x6000));
        image.put_u32(zone + nextgen::ZONE.draw_data_size, 0xA0);
        image.put_u64(zone + nextgen::ZONE.face_indices_ptr, image.addr(0x7000));
        image.put_u32(zone + nextgen::ZONE.face_index_count, 6);

        let surfaces: [(u32, u64, u16, u16, u32); 3] =
            [(0, 0x8000, 3, 1, 0), (1, 0x8100, 3, 1, 3), (2, 0x8000, 3, 1, 0)];
        for (i, (data, material, vcount, fcount, fbase)) in surfaces.into_iter().enumerate() {
            let record = 0x4000 + i as u64 * nextgen::SURFACE_STRIDE as u64;
            image.put_u32(record, data);
            image.put_u64(record + 0x08, image.addr(material));
            image.put_u16(record + 0x10, vcount);
            image.put_u16(record + 0x12, fcount);
            image.put_u32(record + 0x14, fbase);
            image.put(record + nextgen::SURFACE_STRIDE as u64 - 1, &[0]);
        }
        let blocks: [(u32, u32, u32, u32, u32); 3] =
            [(7, 2, 0, 0, 0x40), (7, 2, 24, 12, 0x70), (9, 1, 0, 0, 0)];
        for (i, (zone, layers, pos, tf, uv)) in blocks.into_iter().enumerate() {
            let record = 0x4100 + i as u64 * nextgen::SURFACE_DATA_STRIDE as u64;
            image.put_u32(record, zone);
            image.put_u32(record + 0x04, layers);
            image.put_u32(record + 0x08, pos);
            image.put_u32(record + 0x0C, tf);
            image.put_u32(record + 0x10, uv);
            image.put(record + nextgen::SURFACE_DATA_STRIDE as u64 - 1, &[0]);
        }

        // Zone buffers: six vertices along +X one unit apart, flat frames,
        // two two-layer UV runs.
        for i in 0..6u64 {
            let field = |v: f32| {
                (((v - nextgen::POSITION_OFFSET) / nextgen::POSITION_SCALE) as u64) & 0x1F_FFFF
            };
            let word = field(i as f32) | field(0.0) << 21 | field(0.0) << 42;
            image.put_u64(0x5000 + i * 8, word);
            image.put_u32(0x6000 + i * 4, (3u32 << 30) | (255 << 20) | (511 << 10) | 511);
        }
        for i in 0..3u64 {
            image.put_f32(0x6040 + i * 16, 0.25);
            image.put_f32(0x6044 + i * 16, 0.75);
            image.put_f32(0x6070 + i * 16, 0.5);
            image.put_f32(0x6074 + i * 16, 0.5);
        }
        image.put(0x609F, &[0]);
        for (slot, value) in [0u16, 1, 2, 0, 1, 2].into_iter().enumerate() {
            image.put_u16(0x7000 + slot as u64 * 2, value);
        }

        // Two layered materials sharing one diffuse image; their collapsed
        // names collide on purpose.
        for (i, name) in ["foliage_grass_01", "foliage_grass_02"].into_iter().enumerate() {
            let material = 0x8000 + i as u64 * 0x100;
            image.put_u64(material + nextgen::MATERIAL.name_ptr, image.addr(0x8400 + i as u64 * 0x40));
            image.put_cstr(0x8400 + i as u64 * 0x40, name);
            image.put(material + nextgen::MATERIAL.image_count, &[1]);
            image.put_u64(material + nextgen::MATERIAL.image_table, image.addr(0x8800 + i as u64 * 0x40));
            image.put_u32(0x8800 + i as u64 * 0x40 + nextgen::MATERIAL.image_semantic, 0);
            image.put_u64(0x8800 + i as u64 * 0x40 + nextgen::MATERIAL.image_ref, image.addr(0x8900));
        }
        image.put_u64(0x8900 + nextgen::MATERIAL.image_name_ptr, image.addr(0x8A00));
        image.put_cstr(0x8A00, "foliage_d");

        for i in 0..6u64 {
            let record = 0x4300 + i * nextgen::PLACEMENT_STRIDE as u64;
            image.put_i32(record, i as i32 * 4096);
            image.put_f32(record + 0x14, 1.0);
            image.put(record + nextgen::PLACEMENT_STRIDE as u64 - 1, &[0]);
        }
        for (i, name) in ["props/crate.xmodel", "props/barrel.xmodel"].into_iter().enumerate() {
            let record = 0x4200 + i as u64 * nextgen::UNIQUE_MODEL_STRIDE as u64;
            image.put_u64(record, image.addr(0x9000 + i as u64 * 0x100));
            image.put(record + nextgen::UNIQUE_MODEL_STRIDE as u64 - 1, &[0]);
            image.put_u64(0x9000 + i as u64 * 0x100, image.addr(0x9200 + i as u64 * 0x40));
            image.put_cstr(0x9200 + i as u64 * 0x40, name);
        }
        image.put_u32(0x4400, 1);
        image.put_u32(0x4404, 2);
        image.put_u32(0x4408, 3);
        image
    }

    #[test]
    fn test_nextgen_extraction_end_to_end() {
        let memory = nextgen_world().into_snapshot();
        let dir = tempfile::tempdir().unwrap();
        let stem = dir.path().join("mp_small");
        let options = options(Generation::NextGen, 0x1_0000_0000, stem.clone());
        let mut mesh_writer = RecordingMeshWriter::default();
        let mut map_writer = RecordingMapWriter::default();

        let outcome =
            run_extraction(&memory, &options, &mut mesh_writer, &mut map_writer, |_| {}).unwrap();

        let summary = outcome.extracted().unwrap();
        assert_eq!(summary.asset_name, "mp_small");
        assert_eq!(summary.map_name, "mp_small");
        assert_eq!(summary.surfaces, 3);
        assert_eq!(summary.skipped_surfaces, 1);
        assert_eq!(summary.missing_zones, vec![9]);
        assert_eq!(summary.vertices, 6);
        assert_eq!(summary.faces, 2);
        assert_eq!(summary.materials, 1);
        assert_eq!(summary.entities, 6);

        let (mesh, _) = mesh_writer.saved.unwrap();
        assert_eq!(mesh.faces[0].indices, [0, 2, 1]);
        assert_eq!(mesh.faces[1].indices, [3, 5, 4]);
        assert_eq!(mesh.positions[4], [4.0, 0.0, 0.0]);
        assert_eq!(mesh.uvs[0], [0.25, 0.25]);
        assert_eq!(mesh.uvs[3], [0.5, 0.5]);
        // Layered materials collapse to their shared base name.
        assert_eq!(mesh.materials[0].name, "foliage");
        assert_eq!(mesh.materials[0].diffuse.as_deref(), Some("foliage_d"));

        let map = map_writer.saved.unwrap();
        let models: Vec<&str> = map.entities.iter().map(|e| e.model.as_str()).collect();
        assert_eq!(models, ["model_0", "model_1", "barrel", "barrel", "barrel", "model_5"]);
        assert_eq!(map.entities[1].origin, [1.0, 0.0, 0.0]);

        let search =
            std::fs::read_to_string(dir.path().join("mp_small_search_string.txt")).unwrap();
        assert_eq!(search, "foliage_d,");
    }

    #[test]
    fn test_oversized_map_is_unsupported() {
        let mut image = Image::new(0x1_0000_0000);
        let world_pool = nextgen::POOLS.stride * nextgen::POOLS.world_pool;
        image.put_u64(world_pool + nextgen::POOLS.first_node, image.addr(0x1000));
        image.put_u32(world_pool + nextgen::POOLS.capacity, 4);
        put_nextgen_node(&mut image, 0x1000, 0x3000, 0x1100, "mp_huge");
        image.put_u64(0x3000 + nextgen::WORLD_ASSET.map_name_ptr, image.addr(0x1100));

        // 65538 surfaces at 65535 vertices each push the declared total past
        // the index range.
        let count = 65_538u32;
        image.put_u32(0x3000 + nextgen::WORLD_ASSET.surface_count, count);
        image.put_u64(0x3000 + nextgen::WORLD_ASSET.surface_table, image.addr(0x1_0000));
        let mut table = vec![0u8; count as usize * nextgen::SURFACE_STRIDE];
        for i in 0..count as usize {
            let at = i * nextgen::SURFACE_STRIDE + 0x10;
            table[at..at + 2].copy_from_slice(&65_535u16.to_le_bytes());
        }
        image.put(0x1_0000, &table);

        let memory = image.into_snapshot();
        let dir = tempfile::tempdir().unwrap();
        let options = options(Generation::NextGen, 0x1_0000_0000, dir.path().join("out"));
        let mut mesh_writer = RecordingMeshWriter::default();
        let mut map_writer = RecordingMapWriter::default();
        let outcome =
            run_extraction(&memory, &options, &mut mesh_writer, &mut map_writer, |_| {}).unwrap();
        let reason = outcome.unsupported().unwrap();
        assert_eq!(
            reason,
            UnsupportedReason::MapTooLarge { declared_vertices: 65_535u64 * 65_538 }
        );
        assert!(mesh_writer.saved.is_none());
    }
}

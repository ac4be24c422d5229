//! Surface reconstruction: vertices, then materials, then faces.
//!
//! The three passes share per-surface state through [`SurfacePlan`]. Vertex
//! decoding establishes which surfaces contribute and where their raw face
//! indices rebase to; the material pass fills mesh material slots; the face
//! pass emits triangles against the rebased ranges. A surface whose zone is
//! not resident drops out after the first pass and the others skip it.

use std::collections::BTreeSet;

use tracing::{debug, warn};
use winnow::Parser;
use winnow::binary::{le_f32, le_i32, le_u16, le_u32, le_u64};
use winnow::combinator::repeat;
use winnow::error::ContextError;
use winnow::token::take;

use crate::codec::vertex::{flip_v, unpack_normal, unpack_position, unpack_tangent_frame};
use crate::error::{ErrorKind, RipResult, failure_from_kind};
use crate::layouts::{Generation, legacy, nextgen};
use crate::output::MeshBuffers;
use crate::process::ProcessMemory;
use crate::world::materials::{MaterialResolver, ResolvedMaterial, collapse_layered_name};
use crate::world::zones::ZoneCache;
use crate::world::{DirectGeometry, GeometrySource, read_table};

type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

// Typed wrappers so `repeat` over bare primitives resolves its error type.
fn parse_u16(input: &mut &[u8]) -> WResult<u16> {
    le_u16.parse_next(input)
}

fn parse_u32(input: &mut &[u8]) -> WResult<u32> {
    le_u32.parse_next(input)
}

fn parse_u64(input: &mut &[u8]) -> WResult<u64> {
    le_u64.parse_next(input)
}

/// One surface, normalized across generations.
#[derive(Debug, Clone)]
pub struct SurfaceRecord {
    pub material_ptr: u64,
    pub vertex_count: u16,
    pub face_count: u16,
    /// Element index into the face-index source, not a byte offset.
    pub face_base: u32,
    /// Base vertex inside the shared array. Zero for zoned surfaces.
    pub vertex_base: u32,
    /// Index into the data-block table. Zero for direct surfaces.
    pub data_index: u32,
}

/// Block tying a zoned surface to buffer ranges inside its zone.
#[derive(Debug, Clone)]
pub struct SurfaceDataBlock {
    pub zone: u32,
    pub layer_count: u32,
    pub positions_offset: u32,
    pub tangent_frames_offset: u32,
    pub uvs_offset: u32,
}

/// Per-surface state carried across the passes.
#[derive(Debug)]
pub struct SurfacePlan {
    pub surface: SurfaceRecord,
    /// Mesh index the surface's raw face indices rebase onto.
    pub rebase: u32,
    /// Texture layers interleaved in the UV stream. Always 1 for direct
    /// geometry.
    pub layer_count: u32,
    /// Zone the surface reads from, when zoned.
    pub zone: Option<u32>,
    /// False when the owning zone is not resident; later passes skip the
    /// surface entirely.
    pub emitted: bool,
    /// Mesh material slot, filled by the material pass.
    pub material: Option<usize>,
}

/// Output of the vertex pass.
#[derive(Debug)]
pub struct VertexPass {
    pub plans: Vec<SurfacePlan>,
    /// Zone indices surfaces referenced but the cache does not hold.
    pub missing_zones: Vec<u32>,
}

fn parse_legacy_surface(input: &mut &[u8]) -> WResult<SurfaceRecord> {
    let _ = le_i32.parse_next(input)?;
    let vertex_base = le_i32.parse_next(input)?;
    let vertex_count = le_u16.parse_next(input)?;
    let face_count = le_u16.parse_next(input)?;
    let face_base = le_i32.parse_next(input)?;
    let material_ptr = le_u32.parse_next(input)?;
    let _ = take(legacy::SURFACE_STRIDE - 0x14).parse_next(input)?;
    Ok(SurfaceRecord {
        material_ptr: material_ptr as u64,
        vertex_count,
        face_count,
        face_base: face_base as u32,
        vertex_base: vertex_base as u32,
        data_index: 0,
    })
}

fn parse_nextgen_surface(input: &mut &[u8]) -> WResult<SurfaceRecord> {
    let data_index = le_u32.parse_next(input)?;
    let _ = take(4usize).parse_next(input)?;
    let material_ptr = le_u64.parse_next(input)?;
    let vertex_count = le_u16.parse_next(input)?;
    let face_count = le_u16.parse_next(input)?;
    let face_base = le_u32.parse_next(input)?;
    let _ = take(nextgen::SURFACE_STRIDE - 0x18).parse_next(input)?;
    Ok(SurfaceRecord {
        material_ptr,
        vertex_count,
        face_count,
        face_base,
        vertex_base: 0,
        data_index,
    })
}

fn parse_data_block(input: &mut &[u8]) -> WResult<SurfaceDataBlock> {
    let zone = le_u32.parse_next(input)?;
    let layer_count = le_u32.parse_next(input)?;
    let positions_offset = le_u32.parse_next(input)?;
    let tangent_frames_offset = le_u32.parse_next(input)?;
    let uvs_offset = le_u32.parse_next(input)?;
    let _ = take(nextgen::SURFACE_DATA_STRIDE - 0x14).parse_next(input)?;
    Ok(SurfaceDataBlock {
        zone,
        layer_count,
        positions_offset,
        tangent_frames_offset,
        uvs_offset,
    })
}

struct RawLegacyVertex {
    position: [f32; 3],
    uv: [f32; 2],
    packed_normal: u32,
}

fn parse_legacy_vertex(input: &mut &[u8]) -> WResult<RawLegacyVertex> {
    let mut position = [0f32; 3];
    for axis in &mut position {
        *axis = le_f32.parse_next(input)?;
    }
    let _ = take(8usize).parse_next(input)?;
    let u = le_f32.parse_next(input)?;
    let v = le_f32.parse_next(input)?;
    let _ = take(8usize).parse_next(input)?;
    let packed_normal = le_u32.parse_next(input)?;
    let _ = take(4usize).parse_next(input)?;
    Ok(RawLegacyVertex { position, uv: [u, v], packed_normal })
}

/// Reads and parses the surface table, plus the data-block table when the
/// geometry is zoned.
pub fn read_surfaces<R: ProcessMemory>(
    reader: &R,
    geometry: &GeometrySource,
) -> RipResult<(Vec<SurfaceRecord>, Vec<SurfaceDataBlock>)> {
    match geometry {
        GeometrySource::Direct(geo) => {
            let count = geo.surface_count as usize;
            let raw = read_table(reader, geo.surface_table, count, legacy::SURFACE_STRIDE)?;
            let mut input = raw.as_slice();
            let surfaces: Vec<SurfaceRecord> =
                repeat(count, parse_legacy_surface).parse_next(&mut input)?;
            Ok((surfaces, Vec::new()))
        }
        GeometrySource::Zoned(geo) => {
            let count = geo.surface_count as usize;
            let raw = read_table(reader, geo.surface_table, count, nextgen::SURFACE_STRIDE)?;
            let mut input = raw.as_slice();
            let surfaces: Vec<SurfaceRecord> =
                repeat(count, parse_nextgen_surface).parse_next(&mut input)?;

            let blocks = geo.surface_data_count as usize;
            let raw =
                read_table(reader, geo.surface_data_table, blocks, nextgen::SURFACE_DATA_STRIDE)?;
            let mut input = raw.as_slice();
            let blocks: Vec<SurfaceDataBlock> =
                repeat(blocks, parse_data_block).parse_next(&mut input)?;
            Ok((surfaces, blocks))
        }
    }
}

/// First pass: decodes vertex attributes into the mesh and plans every
/// surface's rebase.
pub fn decode_vertices<R: ProcessMemory>(
    reader: &R,
    geometry: &GeometrySource,
    surfaces: &[SurfaceRecord],
    blocks: &[SurfaceDataBlock],
    zones: &mut ZoneCache,
    mesh: &mut MeshBuffers,
) -> RipResult<VertexPass> {
    match geometry {
        GeometrySource::Direct(geo) => decode_direct(reader, geo, surfaces, mesh),
        GeometrySource::Zoned(_) => decode_zoned(reader, surfaces, blocks, zones, mesh),
    }
}

fn decode_direct<R: ProcessMemory>(
    reader: &R,
    geo: &DirectGeometry,
    surfaces: &[SurfaceRecord],
    mesh: &mut MeshBuffers,
) -> RipResult<VertexPass> {
    let count = geo.vertex_count as usize;
    let raw = read_table(reader, geo.vertex_data, count, legacy::VERTEX_STRIDE)?;
    let mut input = raw.as_slice();
    let vertices: Vec<RawLegacyVertex> =
        repeat(count, parse_legacy_vertex).parse_next(&mut input)?;

    for (i, vertex) in vertices.iter().enumerate() {
        ensure_finite(&vertex.position, i, "position")?;
        let normal = unpack_normal(vertex.packed_normal)
            .ok_or_else(|| failure_from_kind(ErrorKind::DegenerateNormal { vertex: i }))?;
        let uv = flip_v(vertex.uv);
        ensure_finite(&uv, i, "uv")?;
        mesh.push_vertex(vertex.position, normal, uv);
    }

    let mut plans = Vec::with_capacity(surfaces.len());
    for (i, surface) in surfaces.iter().enumerate() {
        let end = surface.vertex_base as u64 + surface.vertex_count as u64;
        if end > geo.vertex_count as u64 {
            return Err(failure_from_kind(ErrorKind::VertexRangeOutOfBounds {
                surface: i,
                base: surface.vertex_base,
                count: surface.vertex_count as u32,
                limit: geo.vertex_count,
            }));
        }
        plans.push(SurfacePlan {
            surface: surface.clone(),
            rebase: surface.vertex_base,
            layer_count: 1,
            zone: None,
            emitted: true,
            material: None,
        });
    }
    debug!(vertices = mesh.vertex_count(), surfaces = plans.len(), "decoded world vertices");
    Ok(VertexPass { plans, missing_zones: Vec::new() })
}

fn decode_zoned<R: ProcessMemory>(
    reader: &R,
    surfaces: &[SurfaceRecord],
    blocks: &[SurfaceDataBlock],
    zones: &mut ZoneCache,
    mesh: &mut MeshBuffers,
) -> RipResult<VertexPass> {
    let mut plans = Vec::with_capacity(surfaces.len());
    let mut missing = BTreeSet::new();

    for (i, surface) in surfaces.iter().enumerate() {
        let block = blocks.get(surface.data_index as usize).ok_or_else(|| {
            failure_from_kind(ErrorKind::SurfaceDataOutOfRange {
                surface: i,
                value: surface.data_index,
                limit: blocks.len() as u32,
            })
        })?;
        if block.layer_count == 0 {
            return Err(failure_from_kind(ErrorKind::ZeroLayerCount { surface: i }));
        }

        let Some(zone) = zones.get_or_load(reader, block.zone)? else {
            if missing.insert(block.zone) {
                warn!(zone = block.zone, surface = i, "zone not resident, its surfaces drop out");
            }
            plans.push(SurfacePlan {
                surface: surface.clone(),
                rebase: 0,
                layer_count: block.layer_count,
                zone: Some(block.zone),
                emitted: false,
                material: None,
            });
            continue;
        };

        let rebase = mesh.vertex_count() as u32;
        let count = surface.vertex_count as usize;

        let mut input =
            zone_slice(&zone.positions, block.positions_offset as u64, count * 8, i, "positions")?;
        let words: Vec<u64> = repeat(count, parse_u64).parse_next(&mut input)?;

        let mut input = zone_slice(
            &zone.draw_data,
            block.tangent_frames_offset as u64,
            count * 4,
            i,
            "tangent frames",
        )?;
        let frames: Vec<u32> = repeat(count, parse_u32).parse_next(&mut input)?;

        let uv_stride = 8 * block.layer_count as usize;
        let mut input =
            zone_slice(&zone.draw_data, block.uvs_offset as u64, count * uv_stride, i, "uvs")?;
        let uvs: Vec<[f32; 2]> = repeat(count, |input: &mut &[u8]| -> WResult<[f32; 2]> {
            let u = le_f32.parse_next(input)?;
            let v = le_f32.parse_next(input)?;
            let _ = take(uv_stride - 8).parse_next(input)?;
            Ok([u, v])
        })
        .parse_next(&mut input)?;

        for vi in 0..count {
            // Quantized positions and tangent frames cannot decode to
            // non-finite values; raw UV floats can.
            let position =
                unpack_position(words[vi], nextgen::POSITION_SCALE, nextgen::POSITION_OFFSET);
            let normal = unpack_tangent_frame(frames[vi]).normal;
            let uv = flip_v(uvs[vi]);
            ensure_finite(&uv, mesh.vertex_count(), "uv")?;
            mesh.push_vertex(position, normal, uv);
        }

        plans.push(SurfacePlan {
            surface: surface.clone(),
            rebase,
            layer_count: block.layer_count,
            zone: Some(block.zone),
            emitted: true,
            material: None,
        });
    }

    debug!(
        vertices = mesh.vertex_count(),
        surfaces = plans.len(),
        missing_zones = missing.len(),
        "decoded zoned vertices"
    );
    Ok(VertexPass { plans, missing_zones: missing.into_iter().collect() })
}

/// Second pass: resolves materials for every emitted surface. Returns the
/// diffuse texture names in first-seen surface order.
pub fn resolve_materials<R: ProcessMemory>(
    reader: &R,
    generation: Generation,
    plans: &mut [SurfacePlan],
    mesh: &mut MeshBuffers,
) -> RipResult<Vec<String>> {
    let mut resolver = MaterialResolver::new();
    let mut textures = Vec::new();
    for plan in plans.iter_mut().filter(|p| p.emitted) {
        // A zeroed record carries no material; keep the surface under an
        // unnamed slot rather than chasing a null pointer.
        let resolved = if plan.surface.material_ptr == 0 {
            ResolvedMaterial { name: String::new(), diffuse: None }
        } else {
            resolver.resolve(reader, generation, plan.surface.material_ptr)?
        };
        let name = if plan.layer_count > 1 {
            collapse_layered_name(&resolved.name)
        } else {
            resolved.name.as_str()
        };
        plan.material = Some(mesh.add_material(name, resolved.diffuse.as_deref()));
        if let Some(diffuse) = resolved.diffuse {
            textures.push(diffuse);
        }
    }
    debug!(materials = mesh.materials.len(), "resolved surface materials");
    Ok(textures)
}

/// Third pass: emits triangles. Returns how many degenerate triples were
/// dropped.
pub fn build_faces<R: ProcessMemory>(
    reader: &R,
    geometry: &GeometrySource,
    plans: &[SurfacePlan],
    zones: &mut ZoneCache,
    mesh: &mut MeshBuffers,
) -> RipResult<usize> {
    let dropped = match geometry {
        GeometrySource::Direct(geo) => faces_direct(reader, geo, plans, mesh)?,
        GeometrySource::Zoned(_) => faces_zoned(reader, plans, zones, mesh)?,
    };
    debug!(faces = mesh.faces.len(), dropped, "built face list");
    Ok(dropped)
}

fn faces_direct<R: ProcessMemory>(
    reader: &R,
    geo: &DirectGeometry,
    plans: &[SurfacePlan],
    mesh: &mut MeshBuffers,
) -> RipResult<usize> {
    let raw = read_table(reader, geo.index_data, geo.index_count as usize, 2)?;
    let mut input = raw.as_slice();
    let indices: Vec<u16> =
        repeat(geo.index_count as usize, parse_u16).parse_next(&mut input)?;

    let mut dropped = 0usize;
    for (i, plan) in plans.iter().enumerate() {
        let Some(material) = plan.material else {
            continue;
        };
        let end = plan.surface.face_base as u64 + plan.surface.face_count as u64 * 3;
        if end > indices.len() as u64 {
            return Err(failure_from_kind(ErrorKind::FaceElementOutOfBounds {
                surface: i,
                element: end,
                limit: indices.len() as u64,
            }));
        }
        let elements = &indices[plan.surface.face_base as usize..end as usize];
        dropped += emit_triangles(
            elements,
            plan.rebase,
            mesh.vertex_count() as u64,
            i,
            material,
            mesh,
        )?;
    }
    Ok(dropped)
}

fn faces_zoned<R: ProcessMemory>(
    reader: &R,
    plans: &[SurfacePlan],
    zones: &mut ZoneCache,
    mesh: &mut MeshBuffers,
) -> RipResult<usize> {
    let mut dropped = 0usize;
    for (i, plan) in plans.iter().enumerate() {
        let (Some(material), Some(zone_index)) = (plan.material, plan.zone) else {
            continue;
        };
        let Some(zone) = zones.get_or_load(reader, zone_index)? else {
            continue;
        };
        let byte_len = plan.surface.face_count as usize * 6;
        let raw = zone_slice(
            &zone.face_indices,
            plan.surface.face_base as u64 * 2,
            byte_len,
            i,
            "face indices",
        )?;
        let mut input = raw;
        let elements: Vec<u16> =
            repeat(plan.surface.face_count as usize * 3, parse_u16).parse_next(&mut input)?;
        // Raw indices are relative to the surface's own vertex run.
        let limit = plan.rebase as u64 + plan.surface.vertex_count as u64;
        dropped += emit_triangles(&elements, plan.rebase, limit, i, material, mesh)?;
    }
    Ok(dropped)
}

/// Rebases raw index triples, validates them against `limit`, drops
/// degenerate triples, and emits the rest with flipped winding.
fn emit_triangles(
    elements: &[u16],
    rebase: u32,
    limit: u64,
    surface: usize,
    material: usize,
    mesh: &mut MeshBuffers,
) -> RipResult<usize> {
    let mut dropped = 0usize;
    for triple in elements.chunks_exact(3) {
        let mut indices = [0u32; 3];
        for (slot, &raw) in indices.iter_mut().zip(triple) {
            let value = rebase as u64 + raw as u64;
            if value >= limit {
                return Err(failure_from_kind(ErrorKind::FaceIndexOutOfBounds {
                    surface,
                    value,
                    limit,
                }));
            }
            *slot = value as u32;
        }
        let [a, b, c] = indices;
        if a == b || b == c || a == c {
            dropped += 1;
            continue;
        }
        mesh.push_face([a, c, b], material);
    }
    Ok(dropped)
}

fn zone_slice<'a>(
    buffer: &'a [u8],
    offset: u64,
    length: usize,
    surface: usize,
    attribute: &'static str,
) -> RipResult<&'a [u8]> {
    match offset.checked_add(length as u64) {
        Some(end) if end <= buffer.len() as u64 => {
            Ok(&buffer[offset as usize..end as usize])
        }
        _ => Err(failure_from_kind(ErrorKind::ZoneSliceOutOfBounds {
            surface,
            attribute,
            offset,
            length: length as u64,
            limit: buffer.len() as u64,
        })),
    }
}

fn ensure_finite(values: &[f32], vertex: usize, attribute: &'static str) -> RipResult<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(failure_from_kind(ErrorKind::NonFiniteAttribute { vertex, attribute }))
    }
}

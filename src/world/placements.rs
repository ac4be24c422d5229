//! Placement decoding and model-name resolution.

use tracing::debug;
use winnow::Parser;
use winnow::binary::{le_f32, le_i32, le_u16, le_u32, le_u64};
use winnow::combinator::repeat;
use winnow::error::ContextError;
use winnow::token::take;

use crate::codec::rotation::{matrix_to_euler_degrees, quat_to_euler_degrees, unpack_quat};
use crate::error::{ErrorKind, RipResult, failure_from_kind};
use crate::layouts::{legacy, nextgen};
use crate::output::PlacedEntity;
use crate::process::{ProcessMemory, PtrWidth};
use crate::world::{PlacementSource, clean_asset_name, read_name_at, read_table};

type WResult<T> = Result<T, winnow::error::ErrMode<ContextError>>;

/// Instance range tying consecutive placements to one unique model.
#[derive(Debug, Clone, Copy)]
pub struct InstanceRange {
    pub unique_model: u32,
    pub first_instance: u32,
    pub instance_count: u32,
}

/// Decodes the placement table into placed entities with resolved model
/// names, world-space origins, and Euler angles in degrees.
pub fn reconstruct<R: ProcessMemory>(
    reader: &R,
    source: &PlacementSource,
) -> RipResult<Vec<PlacedEntity>> {
    match *source {
        PlacementSource::Immediate { table, count } => decode_immediate(reader, table, count),
        PlacementSource::Deferred {
            table,
            count,
            unique_model_table,
            unique_model_count,
            instance_range_table,
            instance_range_count,
        } => {
            let mut entities = decode_deferred(reader, table, count)?;
            let names = read_model_names(reader, unique_model_table, unique_model_count)?;
            let ranges = read_instance_ranges(reader, instance_range_table, instance_range_count)?;
            apply_instance_ranges(&mut entities, &names, &ranges)?;
            Ok(entities)
        }
    }
}

struct RawImmediate {
    origin: [f32; 3],
    matrix: [f32; 9],
    scale: f32,
    model_ptr: u32,
}

fn parse_immediate(input: &mut &[u8]) -> WResult<RawImmediate> {
    let _ = take(4usize).parse_next(input)?;
    let mut origin = [0f32; 3];
    for axis in &mut origin {
        *axis = le_f32.parse_next(input)?;
    }
    let mut matrix = [0f32; 9];
    for cell in &mut matrix {
        *cell = le_f32.parse_next(input)?;
    }
    let scale = le_f32.parse_next(input)?;
    let model_ptr = le_u32.parse_next(input)?;
    let _ = take(legacy::PLACEMENT_STRIDE - 0x3C).parse_next(input)?;
    Ok(RawImmediate { origin, matrix, scale, model_ptr })
}

fn decode_immediate<R: ProcessMemory>(
    reader: &R,
    table: u64,
    count: u32,
) -> RipResult<Vec<PlacedEntity>> {
    let raw = read_table(reader, table, count as usize, legacy::PLACEMENT_STRIDE)?;
    let mut input = raw.as_slice();
    let records: Vec<RawImmediate> =
        repeat(count as usize, parse_immediate).parse_next(&mut input)?;

    let mut entities = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        // The model record's first field is its name pointer; legacy names
        // stay verbatim, path and all.
        let model = if record.model_ptr != 0 {
            read_name_at(reader, record.model_ptr as u64, PtrWidth::Four)?
        } else {
            String::new()
        };
        let angles = matrix_to_euler_degrees(&record.matrix);
        ensure_finite(&record.origin, i, "origin")?;
        ensure_finite(&angles, i, "angles")?;
        ensure_finite(&[record.scale], i, "scale")?;
        entities.push(PlacedEntity::misc_model(model, record.origin, angles, record.scale));
    }
    debug!(placements = entities.len(), "decoded placements");
    Ok(entities)
}

struct RawDeferred {
    position: [i32; 3],
    quat: [u16; 4],
    scale: f32,
}

fn parse_deferred(input: &mut &[u8]) -> WResult<RawDeferred> {
    let mut position = [0i32; 3];
    for axis in &mut position {
        *axis = le_i32.parse_next(input)?;
    }
    let mut quat = [0u16; 4];
    for word in &mut quat {
        *word = le_u16.parse_next(input)?;
    }
    let scale = le_f32.parse_next(input)?;
    let _ = take(nextgen::PLACEMENT_STRIDE - 0x18).parse_next(input)?;
    Ok(RawDeferred { position, quat, scale })
}

fn decode_deferred<R: ProcessMemory>(
    reader: &R,
    table: u64,
    count: u32,
) -> RipResult<Vec<PlacedEntity>> {
    let raw = read_table(reader, table, count as usize, nextgen::PLACEMENT_STRIDE)?;
    let mut input = raw.as_slice();
    let records: Vec<RawDeferred> =
        repeat(count as usize, parse_deferred).parse_next(&mut input)?;

    let mut entities = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let origin = record.position.map(|axis| axis as f32 * nextgen::PLACEMENT_POSITION_SCALE);
        let angles = quat_to_euler_degrees(unpack_quat(record.quat));
        ensure_finite(&angles, i, "angles")?;
        ensure_finite(&[record.scale], i, "scale")?;
        // Placeholder until the instance ranges back-fill real names.
        entities.push(PlacedEntity::misc_model(format!("model_{i}"), origin, angles, record.scale));
    }
    debug!(placements = entities.len(), "decoded placements");
    Ok(entities)
}

fn read_model_names<R: ProcessMemory>(
    reader: &R,
    table: u64,
    count: u32,
) -> RipResult<Vec<String>> {
    let raw = read_table(reader, table, count as usize, nextgen::UNIQUE_MODEL_STRIDE)?;
    let mut input = raw.as_slice();
    let pointers: Vec<u64> = repeat(count as usize, |input: &mut &[u8]| -> WResult<u64> {
        let pointer = le_u64.parse_next(input)?;
        let _ = take(nextgen::UNIQUE_MODEL_STRIDE - 8).parse_next(input)?;
        Ok(pointer)
    })
    .parse_next(&mut input)?;

    let mut names = Vec::with_capacity(pointers.len());
    for pointer in pointers {
        let name = if pointer != 0 {
            read_name_at(reader, pointer, PtrWidth::Eight)?
        } else {
            String::new()
        };
        names.push(clean_asset_name(&name));
    }
    Ok(names)
}

fn read_instance_ranges<R: ProcessMemory>(
    reader: &R,
    table: u64,
    count: u32,
) -> RipResult<Vec<InstanceRange>> {
    let raw = read_table(reader, table, count as usize, nextgen::INSTANCE_RANGE_STRIDE)?;
    let mut input = raw.as_slice();
    let ranges: Vec<InstanceRange> =
        repeat(count as usize, |input: &mut &[u8]| -> WResult<InstanceRange> {
            let unique_model = le_u32.parse_next(input)?;
            let first_instance = le_u32.parse_next(input)?;
            let instance_count = le_u32.parse_next(input)?;
            Ok(InstanceRange { unique_model, first_instance, instance_count })
        })
        .parse_next(&mut input)?;
    Ok(ranges)
}

/// Back-fills model names over the placement runs each range covers.
pub fn apply_instance_ranges(
    entities: &mut [PlacedEntity],
    names: &[String],
    ranges: &[InstanceRange],
) -> RipResult<()> {
    for (i, range) in ranges.iter().enumerate() {
        let name = names.get(range.unique_model as usize).ok_or_else(|| {
            failure_from_kind(ErrorKind::UniqueModelOutOfBounds {
                range: i,
                value: range.unique_model,
                limit: names.len() as u32,
            })
        })?;
        let end = range.first_instance as u64 + range.instance_count as u64;
        if end > entities.len() as u64 {
            return Err(failure_from_kind(ErrorKind::InstanceRangeOutOfBounds {
                range: i,
                first: range.first_instance,
                count: range.instance_count,
                limit: entities.len(),
            }));
        }
        let first = range.first_instance as usize;
        for entity in &mut entities[first..end as usize] {
            entity.model = name.clone();
        }
    }
    Ok(())
}

fn ensure_finite(values: &[f32], placement: usize, attribute: &'static str) -> RipResult<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(failure_from_kind(ErrorKind::NonFinitePlacement { placement, attribute }))
    }
}

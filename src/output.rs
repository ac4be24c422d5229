//! Output containers handed to the writer collaborators.
//!
//! The pipeline fills these; callers pass in [`MeshWriter`] / [`MapWriter`]
//! implementations that serialize them however they like (the file format is
//! deliberately not this crate's business).

use std::path::Path;

use itertools::Itertools;

use crate::error::RipResult;

/// Kind tag carried by every emitted placed entity.
pub const MISC_MODEL: &str = "misc_model";

/// One reconstructed mesh: parallel attribute lists, faces, and the
/// name-deduplicated material table.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub faces: Vec<MeshFace>,
    pub materials: Vec<MeshMaterial>,
}

/// One triangle. The corner indices address all three attribute lists (the
/// lists are parallel); `material` indexes [`MeshBuffers::materials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshFace {
    pub indices: [u32; 3],
    pub material: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshMaterial {
    pub name: String,
    /// Diffuse texture base name, when the material resolved one.
    pub diffuse: Option<String>,
}

impl MeshBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
    }

    /// Registers a material, deduplicating by name. The first registration of
    /// a name wins; later ones return the existing slot unchanged.
    pub fn add_material(&mut self, name: &str, diffuse: Option<&str>) -> usize {
        if let Some(slot) = self.materials.iter().position(|m| m.name == name) {
            return slot;
        }
        self.materials.push(MeshMaterial {
            name: name.to_owned(),
            diffuse: diffuse.map(str::to_owned),
        });
        self.materials.len() - 1
    }

    pub fn push_face(&mut self, indices: [u32; 3], material: usize) {
        self.faces.push(MeshFace { indices, material });
    }

    /// Name of the material a face was emitted under. `face` must come from
    /// this mesh.
    pub fn face_material(&self, face: &MeshFace) -> &str {
        &self.materials[face.material].name
    }
}

/// The placed-object list for one map.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapEntities {
    pub map_name: String,
    pub entities: Vec<PlacedEntity>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlacedEntity {
    pub class_name: String,
    pub model: String,
    pub origin: [f32; 3],
    /// Euler degrees, convention of [`crate::codec::rotation`].
    pub angles: [f32; 3],
    pub scale: f32,
}

impl PlacedEntity {
    pub fn misc_model(model: String, origin: [f32; 3], angles: [f32; 3], scale: f32) -> Self {
        Self {
            class_name: MISC_MODEL.to_owned(),
            model,
            origin,
            angles,
            scale,
        }
    }
}

/// Serializes a reconstructed mesh. Implementations pick the format and file
/// extension; `stem` is the extension-less output path.
pub trait MeshWriter {
    fn save(&mut self, mesh: &MeshBuffers, stem: &Path) -> RipResult<()>;
}

/// Serializes the placed-entity list. Same stem contract as [`MeshWriter`].
pub trait MapWriter {
    fn save(&mut self, map: &MapEntities, stem: &Path) -> RipResult<()>;
}

/// Builds the one-line texture search list: unique names in first-seen order,
/// each followed by a comma.
pub fn texture_search_line<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut line = String::new();
    for name in names.into_iter().unique() {
        line.push_str(name);
        line.push(',');
    }
    line
}

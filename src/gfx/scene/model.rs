//! Models loaded from JSON mesh documents
//!
//! The document layout is the one produced by assimp's JSON exporter:
//!
//! ```json
//! { "meshes": [ {
//!     "vertices": [x, y, z, ...],
//!     "normals": [x, y, z, ...],
//!     "texturecoords": [[u, v, ...]],
//!     "tangents": [...], "bitangents": [...],
//!     "faces": [[0, 1, 2], ...],
//!     "materialindex": 0
//! } ] }
//! ```
//!
//! Position-like streams may also be written as lists of triplets.

use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::Deserialize;

use super::mesh::{InstanceTransform, Mesh, RotationAxes};
use super::object::Drawable;
use super::transform::Transform;
use super::vertex::MeshData;
use crate::gfx::device::GpuDevice;
use crate::gfx::error::RenderError;
use crate::gfx::resources::material::{Material, MaterialDescriptor};
use crate::gfx::resources::texture_cache::TextureCache;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberList {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

impl NumberList {
    fn flatten(self) -> Vec<f32> {
        match self {
            NumberList::Flat(values) => values,
            NumberList::Nested(groups) => groups.into_iter().flatten().collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct MeshDocument {
    vertices: NumberList,
    #[serde(default)]
    normals: Option<NumberList>,
    #[serde(default)]
    texturecoords: Option<NumberList>,
    #[serde(default)]
    tangents: Option<NumberList>,
    #[serde(default)]
    bitangents: Option<NumberList>,
    faces: Vec<Vec<u32>>,
    #[serde(default)]
    materialindex: Option<usize>,
}

/// Parsed model document, before any GPU upload
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDocument {
    meshes: Vec<MeshDocument>,
}

fn triplets(name: &str, stream: &str, values: Vec<f32>) -> Result<Vec<[f32; 3]>, RenderError> {
    if values.len() % 3 != 0 {
        return Err(RenderError::invalid_asset(
            name,
            format!("{stream} length {} is not a multiple of 3", values.len()),
        ));
    }
    Ok(values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

/// Texture coordinates arrive either flat, as per-vertex pairs or triplets,
/// or as assimp UV channels of which only the first is used
fn is_per_vertex(groups: &[Vec<f32>], vertex_count: usize) -> bool {
    groups.len() == vertex_count
        && groups
            .first()
            .is_some_and(|g| (g.len() == 2 || g.len() == 3) && groups.iter().all(|o| o.len() == g.len()))
}

fn tex_coord_pairs(
    name: &str,
    list: NumberList,
    vertex_count: usize,
) -> Result<Vec<[f32; 2]>, RenderError> {
    let values = match list {
        NumberList::Nested(groups) if is_per_vertex(&groups, vertex_count) => {
            groups.into_iter().flatten().collect()
        }
        NumberList::Nested(mut channels) => {
            if channels.is_empty() {
                Vec::new()
            } else {
                channels.swap_remove(0)
            }
        }
        NumberList::Flat(values) => values,
    };

    if values.len() == vertex_count * 3 {
        // three-component channel, drop w
        return Ok(values.chunks_exact(3).map(|c| [c[0], c[1]]).collect());
    }
    if values.len() % 2 != 0 {
        return Err(RenderError::invalid_asset(
            name,
            format!("texturecoords length {} is not a multiple of 2", values.len()),
        ));
    }
    Ok(values.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
}

impl MeshDocument {
    fn into_mesh_data(self, name: &str) -> Result<(MeshData, Option<usize>), RenderError> {
        let positions = triplets(name, "vertices", self.vertices.flatten())?;
        let vertex_count = positions.len();
        let optional = |list: Option<NumberList>, stream: &str| -> Result<Vec<[f32; 3]>, RenderError> {
            list.map(|l| triplets(name, stream, l.flatten()))
                .transpose()
                .map(Option::unwrap_or_default)
        };

        let normals = optional(self.normals, "normals")?;
        let tangents = optional(self.tangents, "tangents")?;
        let bitangents = optional(self.bitangents, "bitangents")?;
        let tex_coords = self
            .texturecoords
            .map(|l| tex_coord_pairs(name, l, vertex_count))
            .transpose()?
            .unwrap_or_default();

        let mut indices = Vec::with_capacity(self.faces.len() * 3);
        for face in &self.faces {
            if face.len() != 3 {
                return Err(RenderError::invalid_asset(
                    name,
                    format!("face with {} indices, expected triangles", face.len()),
                ));
            }
            indices.extend_from_slice(face);
        }

        let data = MeshData {
            positions,
            normals,
            tex_coords,
            tangents,
            bitangents,
            indices,
        };
        data.validate(name)?;
        Ok((data, self.materialindex))
    }
}

impl ModelDocument {
    pub fn from_json(name: &str, json: &str) -> Result<Self, RenderError> {
        serde_json::from_str(json).map_err(|source| RenderError::ModelParse {
            path: name.into(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, RenderError> {
        if !path.exists() {
            return Err(RenderError::MissingModel {
                path: path.to_path_buf(),
            });
        }
        let json = fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| RenderError::ModelParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

/// Ordered meshes sharing one source asset
pub struct Model {
    name: String,
    pub transform: Transform,
    rotation_axes: RotationAxes,
    meshes: Vec<Mesh>,
}

impl Model {
    /// Loads and uploads a model file
    ///
    /// # Arguments
    /// * `path` - JSON model document
    /// * `materials` - Indexed by each mesh's `materialindex`; meshes without
    ///   an index, or every mesh when empty, get [`MaterialDescriptor::model_default`]
    pub fn load(
        device: &mut dyn GpuDevice,
        cache: &mut TextureCache,
        path: impl AsRef<Path>,
        materials: &[Rc<Material>],
    ) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let document = ModelDocument::load(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let model = Self::from_document(device, cache, name, document, materials)?;
        log::info!("Loaded model {} ({} meshes)", path.display(), model.meshes.len());
        Ok(model)
    }

    pub fn from_document(
        device: &mut dyn GpuDevice,
        cache: &mut TextureCache,
        name: impl Into<String>,
        document: ModelDocument,
        materials: &[Rc<Material>],
    ) -> Result<Self, RenderError> {
        let name = name.into();
        let mut default_material: Option<Rc<Material>> = None;
        let mut meshes = Vec::with_capacity(document.meshes.len());

        for (i, mesh_doc) in document.meshes.into_iter().enumerate() {
            let mesh_name = format!("{name}[{i}]");
            let (data, material_index) = mesh_doc.into_mesh_data(&mesh_name)?;

            // supplied materials only apply to meshes that name an index
            let material = match (material_index, materials.is_empty()) {
                (Some(index), false) => materials.get(index).cloned().ok_or_else(|| {
                    RenderError::invalid_asset(
                        &mesh_name,
                        format!("materialindex {index} out of range for {} materials", materials.len()),
                    )
                })?,
                (None, _) | (Some(_), true) => match &default_material {
                    Some(material) => Rc::clone(material),
                    None => {
                        let material =
                            Material::shared(cache, device, &MaterialDescriptor::model_default())?;
                        default_material = Some(Rc::clone(&material));
                        material
                    }
                },
            };

            meshes.push(Mesh::new(device, mesh_name, &data, material)?);
        }

        Ok(Self {
            name,
            transform: Transform::default(),
            rotation_axes: RotationAxes::default(),
            meshes,
        })
    }

    /// Builds a model from geometry already in memory, e.g. procedural shapes
    pub fn from_meshes(
        device: &mut dyn GpuDevice,
        name: impl Into<String>,
        meshes: Vec<(MeshData, Rc<Material>)>,
    ) -> Result<Self, RenderError> {
        let name = name.into();
        let meshes = meshes
            .into_iter()
            .enumerate()
            .map(|(i, (data, material))| Mesh::new(device, format!("{name}[{i}]"), &data, material))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name,
            transform: Transform::default(),
            rotation_axes: RotationAxes::default(),
            meshes,
        })
    }

    pub fn with_rotation_axes(mut self, axes: RotationAxes) -> Self {
        self.rotation_axes = axes;
        self
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Broadcasts `transforms` to every mesh
    pub fn set_transforms(&mut self, transforms: Vec<InstanceTransform>) {
        for mesh in &mut self.meshes {
            mesh.set_transforms(transforms.clone());
        }
    }

    pub fn transforms(&self) -> &[InstanceTransform] {
        self.meshes.first().map(Mesh::transforms).unwrap_or(&[])
    }

    /// Shorthand for unrotated, unscaled instances at `positions`
    pub fn set_positions(&mut self, positions: &[cgmath::Vector3<f32>]) {
        self.set_transforms(positions.iter().copied().map(InstanceTransform::at).collect());
    }
}

impl Drawable for Model {
    fn draw(&self, device: &mut dyn GpuDevice) {
        for mesh in &self.meshes {
            mesh.draw(device, &self.transform, self.rotation_axes);
        }
    }

    fn release(&mut self, device: &mut dyn GpuDevice) {
        for mesh in &mut self.meshes {
            mesh.release(device);
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::recording::RecordingDevice;
    use crate::gfx::resources::texture_cache::tests::texture_dir;
    use cgmath::{Vector2, Vector3};

    const QUAD: &str = r#"{
        "meshes": [{
            "vertices": [0,0,0, 1,0,0, 1,1,0, 0,1,0],
            "normals": [[0,0,1],[0,0,1],[0,0,1],[0,0,1]],
            "texturecoords": [[0,0, 1,0, 1,1, 0,1]],
            "faces": [[0,1,2],[2,3,0]]
        }]
    }"#;

    const TWO_MESHES: &str = r#"{
        "meshes": [
            { "vertices": [0,0,0, 1,0,0, 0,1,0], "normals": [0,0,1, 0,0,1, 0,0,1],
              "faces": [[0,1,2]], "materialindex": 1 },
            { "vertices": [0,0,0, 1,0,0, 0,1,0], "normals": [0,0,1, 0,0,1, 0,0,1],
              "faces": [[0,2,1]] }
        ]
    }"#;

    fn default_textures(name: &str) -> TextureCache {
        let dir = texture_dir(name, &["diffuse.jpg", "normal.jpg", "specular.jpg", "depth.jpg"]);
        TextureCache::new(dir)
    }

    #[test]
    fn test_quad_parses_assimp_layout() {
        let document = ModelDocument::from_json("quad", QUAD).unwrap();
        let (data, material) = document.meshes[0].clone().into_mesh_data("quad").unwrap();
        assert_eq!(data.vertex_count(), 4);
        assert_eq!(data.tex_coords[2], [1.0, 1.0]);
        assert_eq!(data.indices, vec![0, 1, 2, 2, 3, 0]);
        assert!(material.is_none());
    }

    fn quad_tex_coords(texturecoords: &str) -> Vec<[f32; 2]> {
        let json = format!(
            r#"{{ "meshes": [{{
                "vertices": [0,0,0, 1,0,0, 1,1,0, 0,1,0],
                "normals": [0,0,1, 0,0,1, 0,0,1, 0,0,1],
                "texturecoords": {texturecoords},
                "faces": [[0,1,2],[2,3,0]]
            }}] }}"#
        );
        let document = ModelDocument::from_json("quad", &json).unwrap();
        let (data, _) = document.meshes[0].clone().into_mesh_data("quad").unwrap();
        data.tex_coords
    }

    #[test]
    fn test_tex_coord_layouts_agree() {
        let expected = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        // flat list
        assert_eq!(quad_tex_coords("[0,0, 1,0, 1,1, 0,1]"), expected);
        // per-vertex pairs
        assert_eq!(quad_tex_coords("[[0,0],[1,0],[1,1],[0,1]]"), expected);
        // assimp channel with a third component, w dropped
        assert_eq!(quad_tex_coords("[[0,0,0, 1,0,0.5, 1,1,0, 0,1,0.5]]"), expected);
        // per-vertex triplets
        assert_eq!(quad_tex_coords("[[0,0,9],[1,0,9],[1,1,9],[0,1,9]]"), expected);
    }

    #[test]
    fn test_odd_tex_coord_length_rejected() {
        let json = r#"{ "meshes": [{
            "vertices": [0,0,0, 1,0,0, 0,1,0],
            "normals": [0,0,1, 0,0,1, 0,0,1],
            "texturecoords": [0,0, 1,0, 1],
            "faces": [[0,1,2]]
        }] }"#;
        let document = ModelDocument::from_json("odd", json).unwrap();
        let err = document.meshes[0].clone().into_mesh_data("odd").unwrap_err();
        assert!(matches!(err, RenderError::InvalidAsset { .. }));
    }

    #[test]
    fn test_default_material_loaded_once() {
        let mut device = RecordingDevice::new(800, 600);
        let mut cache = default_textures("model-default");
        let document = ModelDocument::from_json("two", TWO_MESHES).unwrap();

        let model = Model::from_document(&mut device, &mut cache, "two", document, &[]).unwrap();
        assert_eq!(model.meshes().len(), 2);
        assert!(Rc::ptr_eq(model.meshes()[0].material(), model.meshes()[1].material()));
        assert_eq!(model.meshes()[0].material().height_scale(), 0.12);
        assert_eq!(device.textures_created(), 4);
    }

    #[test]
    fn test_material_index_selects_supplied_material() {
        let mut device = RecordingDevice::new(800, 600);
        let dir = texture_dir(
            "model-index",
            &["a.png", "b.png", "diffuse.jpg", "normal.jpg", "specular.jpg", "depth.jpg"],
        );
        let mut cache = TextureCache::new(dir);
        let materials = [
            Material::shared(&mut cache, &mut device, &MaterialDescriptor::new("a.png")).unwrap(),
            Material::shared(&mut cache, &mut device, &MaterialDescriptor::new("b.png")).unwrap(),
        ];
        let document = ModelDocument::from_json("two", TWO_MESHES).unwrap();

        let model = Model::from_document(&mut device, &mut cache, "two", document, &materials).unwrap();
        assert_eq!(model.meshes()[0].material().name(), "b.png");
        // no materialindex: the default material, not the first supplied one
        assert_eq!(model.meshes()[1].material().name(), "default");
        assert_eq!(model.meshes()[1].material().height_scale(), 0.12);
    }

    #[test]
    fn test_material_index_out_of_range() {
        let mut device = RecordingDevice::new(800, 600);
        let dir = texture_dir("model-range", &["a.png"]);
        let mut cache = TextureCache::new(dir);
        let materials =
            [Material::shared(&mut cache, &mut device, &MaterialDescriptor::new("a.png")).unwrap()];
        let document = ModelDocument::from_json("two", TWO_MESHES).unwrap();

        let err = Model::from_document(&mut device, &mut cache, "two", document, &materials)
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::InvalidAsset { .. }));
    }

    #[test]
    fn test_missing_model_file() {
        let mut device = RecordingDevice::new(800, 600);
        let mut cache = default_textures("model-missing");
        let err = Model::load(&mut device, &mut cache, "resources/models/none.json", &[])
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "Model source file resources/models/none.json does not exist."
        );
    }

    #[test]
    fn test_malformed_faces_rejected() {
        let json = r#"{ "meshes": [{ "vertices": [0,0,0, 1,0,0, 0,1,0],
            "normals": [0,0,1, 0,0,1, 0,0,1], "faces": [[0,1]] }] }"#;
        let document = ModelDocument::from_json("bad", json).unwrap();
        assert!(document.meshes[0].clone().into_mesh_data("bad").is_err());
        assert!(ModelDocument::from_json("bad", "{ not json").is_err());
    }

    #[test]
    fn test_set_then_get_transforms() {
        let mut device = RecordingDevice::new(800, 600);
        let mut cache = default_textures("model-transforms");
        let dir = cache.root().to_path_buf();
        fs::write(dir.join("two.json"), TWO_MESHES).unwrap();
        let mut model = Model::load(&mut device, &mut cache, dir.join("two.json"), &[]).unwrap();

        let transforms = vec![
            InstanceTransform::at(Vector3::new(0.0, 0.0, 0.0)),
            InstanceTransform::new(
                Vector3::new(1.0, 1.0, 1.0),
                Vector2::new(45.0, 10.0),
                Vector3::new(2.0, 2.0, 2.0),
            ),
        ];
        model.set_transforms(transforms.clone());

        assert_eq!(model.transforms(), transforms.as_slice());
        for mesh in model.meshes() {
            assert_eq!(mesh.transforms(), transforms.as_slice());
        }

        model.set_transforms(Vec::new());
        assert!(model.transforms().is_empty());
    }
}

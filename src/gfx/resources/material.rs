//! Textured surface materials
//!
//! A [`Material`] references cached textures; it never owns GPU memory. It is
//! built once from a [`MaterialDescriptor`] and then shared read-only through
//! `Rc<Material>` by every mesh that uses it.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::texture_cache::{Texture, TextureCache};
use crate::gfx::device::GpuDevice;
use crate::gfx::error::RenderError;

/// Fixed texture units
pub const SKYBOX_UNIT: u32 = 0;
pub const DIFFUSE_UNIT: u32 = 1;
pub const NORMAL_UNIT: u32 = 2;
pub const SPECULAR_UNIT: u32 = 3;
pub const DISPLACEMENT_UNIT: u32 = 4;
pub const SHADOW_UNIT: u32 = 10;

pub const DEFAULT_SHININESS: f32 = 64.0;

/// Texture file names and shading scalars for one material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDescriptor {
    pub name: String,
    pub diffuse: String,
    #[serde(default)]
    pub normal: Option<String>,
    #[serde(default)]
    pub specular: Option<String>,
    #[serde(default)]
    pub displacement: Option<String>,
    #[serde(default = "default_shininess")]
    pub shininess: f32,
    #[serde(default)]
    pub height_scale: f32,
}

fn default_shininess() -> f32 {
    DEFAULT_SHININESS
}

impl MaterialDescriptor {
    pub fn new(diffuse: impl Into<String>) -> Self {
        let diffuse = diffuse.into();
        Self {
            name: diffuse.clone(),
            diffuse,
            normal: None,
            specular: None,
            displacement: None,
            shininess: DEFAULT_SHININESS,
            height_scale: 0.0,
        }
    }

    /// The material used by models that do not specify one
    pub fn model_default() -> Self {
        Self::new("diffuse.jpg")
            .with_name("default")
            .with_normal("normal.jpg")
            .with_specular("specular.jpg")
            .with_displacement("depth.jpg")
            .with_height_scale(0.12)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_normal(mut self, path: impl Into<String>) -> Self {
        self.normal = Some(path.into());
        self
    }

    pub fn with_specular(mut self, path: impl Into<String>) -> Self {
        self.specular = Some(path.into());
        self
    }

    pub fn with_displacement(mut self, path: impl Into<String>) -> Self {
        self.displacement = Some(path.into());
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    /// Zero disables parallax mapping
    pub fn with_height_scale(mut self, height_scale: f32) -> Self {
        self.height_scale = height_scale;
        self
    }
}

#[derive(Debug)]
pub struct Material {
    name: String,
    diffuse: Rc<Texture>,
    normal: Option<Rc<Texture>>,
    specular: Option<Rc<Texture>>,
    displacement: Option<Rc<Texture>>,
    shininess: f32,
    height_scale: f32,
}

impl Material {
    /// Resolves every texture in `descriptor` through `cache`
    ///
    /// # Errors
    /// Any missing or undecodable texture fails the whole material.
    pub fn new(
        cache: &mut TextureCache,
        device: &mut dyn GpuDevice,
        descriptor: &MaterialDescriptor,
    ) -> Result<Self, RenderError> {
        let diffuse = cache.get_or_load(device, &descriptor.diffuse)?;
        let mut load = |key: &Option<String>| -> Result<Option<Rc<Texture>>, RenderError> {
            key.as_deref()
                .map(|key| cache.get_or_load(&mut *device, key))
                .transpose()
        };
        let normal = load(&descriptor.normal)?;
        let specular = load(&descriptor.specular)?;
        let displacement = load(&descriptor.displacement)?;

        Ok(Self {
            name: descriptor.name.clone(),
            diffuse,
            normal,
            specular,
            displacement,
            shininess: descriptor.shininess.max(0.0),
            height_scale: descriptor.height_scale,
        })
    }

    pub fn shared(
        cache: &mut TextureCache,
        device: &mut dyn GpuDevice,
        descriptor: &MaterialDescriptor,
    ) -> Result<Rc<Self>, RenderError> {
        Self::new(cache, device, descriptor).map(Rc::new)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn diffuse(&self) -> &Rc<Texture> {
        &self.diffuse
    }

    pub fn normal(&self) -> Option<&Rc<Texture>> {
        self.normal.as_ref()
    }

    pub fn specular(&self) -> Option<&Rc<Texture>> {
        self.specular.as_ref()
    }

    pub fn displacement(&self) -> Option<&Rc<Texture>> {
        self.displacement.as_ref()
    }

    pub fn shininess(&self) -> f32 {
        self.shininess
    }

    pub fn height_scale(&self) -> f32 {
        self.height_scale
    }

    /// Binds present maps to their units and sets the `mat.*` uniforms
    pub fn bind(&self, device: &mut dyn GpuDevice) {
        device.bind_texture(DIFFUSE_UNIT, self.diffuse.handle());
        device.set_int("mat.diffuseMap", DIFFUSE_UNIT as i32);

        let optional = [
            (&self.normal, NORMAL_UNIT, "mat.normalMap", "mat.hasNormalMap"),
            (&self.specular, SPECULAR_UNIT, "mat.specularMap", "mat.hasSpecularMap"),
            (&self.displacement, DISPLACEMENT_UNIT, "mat.depthMap", "mat.hasDepthMap"),
        ];
        for (texture, unit, sampler, flag) in optional {
            match texture {
                Some(texture) => {
                    device.bind_texture(unit, texture.handle());
                    device.set_int(sampler, unit as i32);
                    device.set_float(flag, 1.0);
                }
                None => device.set_float(flag, 0.0),
            }
        }

        device.set_float("mat.shininess", self.shininess);
        device.set_float("mat.heightScale", self.height_scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::recording::{Command, RecordingDevice};
    use crate::gfx::device::Uniform;
    use crate::gfx::resources::program::{ProgramKind, ShaderProgram};
    use crate::gfx::resources::texture_cache::tests::texture_dir;

    #[test]
    fn test_materials_share_diffuse_texture() {
        let dir = texture_dir("material-share", &["brick.png", "brick_n.png", "moss_s.png"]);
        let mut device = RecordingDevice::new(64, 64);
        let mut cache = TextureCache::new(&dir);

        let plain = Material::new(&mut cache, &mut device, &MaterialDescriptor::new("brick.png")).unwrap();
        let bumpy = Material::new(
            &mut cache,
            &mut device,
            &MaterialDescriptor::new("brick.png")
                .with_normal("brick_n.png")
                .with_specular("moss_s.png"),
        )
        .unwrap();

        assert!(Rc::ptr_eq(plain.diffuse(), bumpy.diffuse()));
        assert_eq!(device.textures_created(), 3);
        assert!(plain.normal().is_none());
        assert!(bumpy.displacement().is_none());
    }

    #[test]
    fn test_defaults_and_clamping() {
        let dir = texture_dir("material-defaults", &["a.png"]);
        let mut device = RecordingDevice::new(64, 64);
        let mut cache = TextureCache::new(&dir);

        let material = Material::new(
            &mut cache,
            &mut device,
            &MaterialDescriptor::new("a.png").with_shininess(-3.0),
        )
        .unwrap();
        assert_eq!(material.shininess(), 0.0);
        assert_eq!(material.height_scale(), 0.0);
        assert_eq!(MaterialDescriptor::new("a.png").shininess, DEFAULT_SHININESS);
    }

    #[test]
    fn test_missing_optional_map_fails_material() {
        let dir = texture_dir("material-missing", &["a.png"]);
        let mut device = RecordingDevice::new(64, 64);
        let mut cache = TextureCache::new(&dir);

        let result = Material::new(
            &mut cache,
            &mut device,
            &MaterialDescriptor::new("a.png").with_normal("a_normal.png"),
        );
        assert!(result.unwrap_err().is_missing_asset());
    }

    #[test]
    fn test_bind_sets_units_and_flags() {
        let dir = texture_dir("material-bind", &["d.png", "h.png"]);
        let mut device = RecordingDevice::new(64, 64);
        let mut cache = TextureCache::new(&dir);
        let program = ShaderProgram::builtin(&mut device, ProgramKind::Lighting).unwrap();

        let material = Material::new(
            &mut cache,
            &mut device,
            &MaterialDescriptor::new("d.png")
                .with_displacement("h.png")
                .with_height_scale(0.12),
        )
        .unwrap();

        program.activate(&mut device);
        material.bind(&mut device);

        let handle = program.handle();
        assert_eq!(device.uniform(handle, "mat.diffuseMap"), Some(Uniform::Int(1)));
        assert_eq!(device.uniform(handle, "mat.depthMap"), Some(Uniform::Int(4)));
        assert_eq!(device.uniform(handle, "mat.hasDepthMap"), Some(Uniform::Float(1.0)));
        assert_eq!(device.uniform(handle, "mat.hasNormalMap"), Some(Uniform::Float(0.0)));
        assert_eq!(device.uniform(handle, "mat.heightScale"), Some(Uniform::Float(0.12)));
        assert!(device
            .commands()
            .contains(&Command::BindTexture { unit: DISPLACEMENT_UNIT, texture: material.displacement().unwrap().handle() }));
    }

    #[test]
    fn test_descriptor_from_toml() {
        let descriptor: MaterialDescriptor = toml::from_str(
            r#"
            name = "stone"
            diffuse = "stone.jpg"
            normal = "stone_n.jpg"
            "#,
        )
        .unwrap();
        assert_eq!(descriptor.shininess, DEFAULT_SHININESS);
        assert_eq!(descriptor.normal.as_deref(), Some("stone_n.jpg"));
        assert!(descriptor.specular.is_none());
    }
}

//! Cube-mapped background
//!
//! The six faces are loaded once at construction. Drawing strips translation
//! from the view matrix and writes no depth, so the box stays infinitely far
//! away and behind all scene geometry.

use std::path::Path;

use cgmath::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};

use crate::gfx::device::{GpuDevice, ImageData, MeshHandle, TextureHandle};
use crate::gfx::error::RenderError;
use crate::gfx::geometry::generate_cube;
use crate::gfx::resources::material::SKYBOX_UNIT;
use crate::gfx::resources::program::ShaderProgram;
use crate::gfx::resources::texture_cache::load_image;

const SKYBOX_SCALE: f32 = 10.0;

/// Face file names relative to the skybox resource root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkyboxFaces {
    pub right: String,
    pub left: String,
    pub top: String,
    pub bottom: String,
    pub back: String,
    pub front: String,
}

impl Default for SkyboxFaces {
    fn default() -> Self {
        Self {
            right: "right.jpg".to_string(),
            left: "left.jpg".to_string(),
            top: "top.jpg".to_string(),
            bottom: "bottom.jpg".to_string(),
            back: "back.jpg".to_string(),
            front: "front.jpg".to_string(),
        }
    }
}

impl SkyboxFaces {
    /// Cube-map layer order: +X, -X, +Y, -Y, +Z, -Z
    pub fn in_layer_order(&self) -> [&str; 6] {
        [
            &self.right,
            &self.left,
            &self.top,
            &self.bottom,
            &self.back,
            &self.front,
        ]
    }
}

pub struct Skybox {
    cube_map: TextureHandle,
    cube: MeshHandle,
    index_count: u32,
    released: bool,
}

impl Skybox {
    /// Loads the faces from `root` and uploads the cube map
    ///
    /// # Errors
    /// Any missing face, or faces that are not square and equally sized.
    pub fn load(
        device: &mut dyn GpuDevice,
        root: &Path,
        faces: &SkyboxFaces,
    ) -> Result<Self, RenderError> {
        let mut images = Vec::with_capacity(6);
        for face in faces.in_layer_order() {
            images.push(load_image(&root.join(face), false)?);
        }
        let images: [ImageData; 6] = images
            .try_into()
            .map_err(|_| RenderError::invalid_asset("skybox", "expected six faces"))?;
        Self::from_faces(device, images)
    }

    pub fn from_faces(device: &mut dyn GpuDevice, faces: [ImageData; 6]) -> Result<Self, RenderError> {
        let size = (faces[0].width, faces[0].height);
        for face in &faces {
            if !face.is_square() || (face.width, face.height) != size {
                return Err(RenderError::invalid_asset(
                    "skybox",
                    format!(
                        "faces must be square and equal, got {}x{} and {}x{}",
                        size.0, size.1, face.width, face.height
                    ),
                ));
            }
        }

        let cube_map = device.create_cube_map("skybox", &faces)?;
        let cube_data = generate_cube();
        let cube = device.create_mesh("skybox cube", &cube_data)?;
        log::info!("Created {}x{} skybox", size.0, size.1);

        Ok(Self {
            cube_map,
            cube,
            index_count: cube_data.index_count(),
            released: false,
        })
    }

    pub fn cube_map(&self) -> TextureHandle {
        self.cube_map
    }

    /// Draws behind everything using `program`
    ///
    /// Leaves `program` current; the caller re-activates its own program.
    pub fn draw(
        &self,
        device: &mut dyn GpuDevice,
        program: &ShaderProgram,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
    ) {
        if self.released {
            return;
        }
        let rotation_only = Matrix4::from(Matrix3::from_cols(
            view.x.truncate(),
            view.y.truncate(),
            view.z.truncate(),
        ));

        device.set_depth_write(false);
        device.set_face_culling(false);
        program.activate(device);
        device.set_mat4("view", rotation_only);
        device.set_mat4("projection", projection);
        device.set_mat4("model", Matrix4::from_scale(SKYBOX_SCALE));
        device.set_int("skybox", SKYBOX_UNIT as i32);
        device.bind_texture(SKYBOX_UNIT, self.cube_map);
        device.bind_mesh(self.cube);
        device.draw_indexed(self.index_count, 1);
        device.set_face_culling(true);
        device.set_depth_write(true);
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if !self.released {
            device.release_texture(self.cube_map);
            device.release_mesh(self.cube);
            self.released = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::recording::{Command, RecordingDevice};
    use crate::gfx::device::Uniform;
    use crate::gfx::resources::program::ProgramKind;
    use crate::gfx::resources::texture_cache::tests::texture_dir;
    use cgmath::{Vector3, Vector4};

    fn faces(size: u32) -> [ImageData; 6] {
        std::array::from_fn(|_| ImageData::solid(size, size, [10, 20, 30, 255]))
    }

    #[test]
    fn test_view_translation_is_stripped() {
        let mut device = RecordingDevice::new(800, 600);
        let program = ShaderProgram::builtin(&mut device, ProgramKind::Skybox).unwrap();
        let skybox = Skybox::from_faces(&mut device, faces(8)).unwrap();

        let view = Matrix4::from_translation(Vector3::new(5.0, -3.0, 9.0));
        skybox.draw(&mut device, &program, view, Matrix4::from_scale(1.0));

        match device.uniform(program.handle(), "view") {
            Some(Uniform::Mat4(m)) => assert_eq!(m.w, Vector4::new(0.0, 0.0, 0.0, 1.0)),
            other => panic!("view not set: {other:?}"),
        }
    }

    #[test]
    fn test_depth_write_disabled_around_draw() {
        let mut device = RecordingDevice::new(800, 600);
        let program = ShaderProgram::builtin(&mut device, ProgramKind::Skybox).unwrap();
        let skybox = Skybox::from_faces(&mut device, faces(8)).unwrap();
        device.clear_commands();

        skybox.draw(&mut device, &program, Matrix4::from_scale(1.0), Matrix4::from_scale(1.0));

        let off = device.position_of(|c| *c == Command::SetDepthWrite(false)).unwrap();
        let draw = device.position_of(|c| matches!(c, Command::DrawIndexed { .. })).unwrap();
        let on = device.position_of(|c| *c == Command::SetDepthWrite(true)).unwrap();
        assert!(off < draw && draw < on);
        assert!(device.commands().contains(&Command::BindTexture {
            unit: SKYBOX_UNIT,
            texture: skybox.cube_map(),
        }));
    }

    #[test]
    fn test_non_square_faces_rejected() {
        let mut device = RecordingDevice::new(800, 600);
        let mut images = faces(8);
        images[3] = ImageData::solid(8, 4, [0; 4]);
        assert!(Skybox::from_faces(&mut device, images).is_err());
    }

    #[test]
    fn test_load_from_directory() {
        let names = SkyboxFaces::default();
        let dir = texture_dir("skybox-load", &names.in_layer_order());
        let mut device = RecordingDevice::new(800, 600);

        let mut skybox = Skybox::load(&mut device, &dir, &names).unwrap();
        assert_eq!(device.textures_created(), 1);

        skybox.release(&mut device);
        assert_eq!(device.live_textures(), 0);
        assert_eq!(device.live_meshes(), 0);
    }

    #[test]
    fn test_missing_face_is_fatal() {
        let dir = texture_dir("skybox-missing", &["right.jpg"]);
        let mut device = RecordingDevice::new(800, 600);
        let err = Skybox::load(&mut device, &dir, &SkyboxFaces::default()).err().unwrap();
        assert!(err.is_missing_asset());
    }
}

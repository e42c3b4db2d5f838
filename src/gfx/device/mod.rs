//! Immediate-mode GPU command interface
//!
//! Meshes, materials, passes and the scene talk to the GPU only through
//! [`GpuDevice`]. The trait mirrors a classic bind-then-draw API: a program is
//! made current, uniforms are set on it by name, textures are bound to fixed
//! units and draws are issued against whatever state is current.
//!
//! Two implementations ship with the crate:
//!
//! - [`crate::gfx::rendering::RenderEngine`] records the commands for a frame
//!   and replays them on wgpu at [`GpuDevice::finish_frame`]
//! - [`recording::RecordingDevice`] keeps the command stream on the CPU for
//!   inspection

pub mod recording;

use cgmath::{Matrix4, Vector3};

use crate::gfx::error::RenderError;
use crate::gfx::resources::program::ProgramSource;
use crate::gfx::scene::vertex::MeshData;

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn id(&self) -> u32 {
                self.0
            }
        }
    };
}

handle_type!(
    /// GPU texture (2D, cube map or depth)
    TextureHandle
);
handle_type!(
    /// Vertex and index buffers for one mesh
    MeshHandle
);
handle_type!(
    /// Compiled shader program
    ProgramHandle
);
handle_type!(
    /// Off-screen render target
    FramebufferHandle
);

/// Decoded RGBA8 image, rows ordered bottom to top after loading
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Single-colour image, mostly useful for tests and fallbacks
    ///
    /// Dimensions too large to address leave the image without pixels.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height).unwrap_or(0))
            .collect();
        Self::new(width, height, pixels)
    }

    /// Bytes in a `width` x `height` RGBA8 image, `None` on overflow
    pub fn byte_len(width: u32, height: u32) -> Option<usize> {
        (width as usize).checked_mul(height as usize)?.checked_mul(4)
    }

    /// True when `pixels` holds exactly one RGBA8 texel per pixel
    pub fn has_consistent_len(&self) -> bool {
        Self::byte_len(self.width, self.height) == Some(self.pixels.len())
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Sampling parameters applied to a texture at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerParams {
    pub wrap: WrapMode,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mipmaps: bool,
}

impl SamplerParams {
    /// Repeat wrap, trilinear filtering, full mip chain
    pub const MATERIAL: Self = Self {
        wrap: WrapMode::Repeat,
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        mipmaps: true,
    };

    /// Clamp-to-edge, linear, no mips
    pub const CUBE_MAP: Self = Self {
        wrap: WrapMode::ClampToEdge,
        min_filter: FilterMode::Linear,
        mag_filter: FilterMode::Linear,
        mipmaps: false,
    };
}

/// Depth-only render target and the texture it renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthTarget {
    pub framebuffer: FramebufferHandle,
    pub texture: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Value assigned to a named program uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    Int(i32),
    Float(f32),
    Vec3(Vector3<f32>),
    Mat4(Matrix4<f32>),
}

/// Buffers cleared by [`GpuDevice::clear`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearFlags {
    pub color: bool,
    pub depth: bool,
}

impl ClearFlags {
    pub const COLOR_DEPTH: Self = Self {
        color: true,
        depth: true,
    };
    pub const DEPTH: Self = Self {
        color: false,
        depth: true,
    };
}

/// A single immediate-mode graphics API
///
/// Resource creation fails loudly; state changes and draws never fail, they
/// only enqueue work. Release calls are best effort and tolerate handles that
/// are already gone.
pub trait GpuDevice {
    fn create_texture(
        &mut self,
        label: &str,
        image: &ImageData,
        params: SamplerParams,
    ) -> Result<TextureHandle, RenderError>;

    /// Faces in the order +X, -X, +Y, -Y, +Z, -Z
    fn create_cube_map(
        &mut self,
        label: &str,
        faces: &[ImageData; 6],
    ) -> Result<TextureHandle, RenderError>;

    /// Fails with [`RenderError::IncompleteFramebuffer`] if the target cannot be completed
    fn create_depth_target(&mut self, width: u32, height: u32)
        -> Result<DepthTarget, RenderError>;

    fn create_mesh(&mut self, label: &str, data: &MeshData) -> Result<MeshHandle, RenderError>;

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, RenderError>;

    fn release_texture(&mut self, texture: TextureHandle);
    fn release_mesh(&mut self, mesh: MeshHandle);
    fn release_depth_target(&mut self, target: &DepthTarget);
    fn release_program(&mut self, program: ProgramHandle);

    fn use_program(&mut self, program: ProgramHandle);

    /// Sets a uniform on the current program; it persists for that program
    fn set_uniform(&mut self, name: &str, value: Uniform);

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    /// `None` targets the window surface
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    fn set_viewport(&mut self, width: u32, height: u32);
    fn viewport(&self) -> (u32, u32);

    fn set_clear_color(&mut self, color: [f32; 4]);
    fn clear(&mut self, flags: ClearFlags);

    fn set_depth_write(&mut self, enabled: bool);
    fn set_face_culling(&mut self, enabled: bool);

    fn bind_mesh(&mut self, mesh: MeshHandle);
    fn draw_indexed(&mut self, index_count: u32, instance_count: u32);

    /// Submits the frame and presents it
    fn finish_frame(&mut self) -> Result<(), RenderError>;

    fn set_int(&mut self, name: &str, value: i32) {
        self.set_uniform(name, Uniform::Int(value));
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.set_uniform(name, Uniform::Float(value));
    }

    fn set_vec3(&mut self, name: &str, value: Vector3<f32>) {
        self.set_uniform(name, Uniform::Vec3(value));
    }

    fn set_mat4(&mut self, name: &str, value: Matrix4<f32>) {
        self.set_uniform(name, Uniform::Mat4(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_image_size() {
        let image = ImageData::solid(2, 3, [1, 2, 3, 4]);
        assert_eq!(image.pixels.len(), 24);
        assert_eq!(&image.pixels[20..24], &[1, 2, 3, 4]);
        assert!(!image.is_square());
        assert!(image.has_consistent_len());
    }

    #[test]
    fn test_byte_len_does_not_overflow() {
        assert_eq!(ImageData::byte_len(32768, 32768), Some(1 << 32));
        assert_eq!(ImageData::byte_len(u32::MAX, u32::MAX), None);
        assert!(!ImageData::new(u32::MAX, u32::MAX, vec![]).has_consistent_len());
        assert!(ImageData::solid(u32::MAX, u32::MAX, [0; 4]).pixels.is_empty());
    }
}

//! Depth-only shadow capture
//!
//! [`ShadowPass`] owns an off-screen depth target and the light-space matrix
//! that projects the scene into it. A frame brackets the depth draws with
//! [`ShadowPass::start`] and [`ShadowPass::end`]:
//!
//! ```text
//! Idle --start--> Capturing --end--> Idle
//! ```
//!
//! `end` hands the depth texture to the lighting program on
//! [`SHADOW_UNIT`](crate::gfx::resources::material::SHADOW_UNIT).

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};

use crate::gfx::device::{ClearFlags, DepthTarget, GpuDevice, TextureHandle};
use crate::gfx::error::RenderError;
use crate::gfx::resources::material::SHADOW_UNIT;
use crate::gfx::resources::program::ShaderProgram;
use crate::gfx::scene::transform::WORLD_UP;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowState {
    Idle,
    Capturing,
}

/// Orthographic volume covered by the shadow map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowProjection {
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowProjection {
    fn default() -> Self {
        Self {
            half_extent: 10.0,
            near: 1.0,
            far: 200.0,
        }
    }
}

impl ShadowProjection {
    pub fn matrix(&self) -> Matrix4<f32> {
        let e = self.half_extent;
        cgmath::ortho(-e, e, -e, e, self.near, self.far)
    }
}

/// projection × look-at from `light_position` toward the origin
pub fn light_space_matrix(projection: &ShadowProjection, light_position: Vector3<f32>) -> Matrix4<f32> {
    let to_origin = -light_position;
    // looking straight along world up leaves look_at without a usable up
    let up = if to_origin.magnitude2() > f32::EPSILON
        && to_origin.normalize().cross(WORLD_UP).magnitude2() < 1e-6
    {
        Vector3::unit_z()
    } else {
        WORLD_UP
    };
    let view = Matrix4::look_at_rh(Point3::from_vec(light_position), Point3::origin(), up);
    projection.matrix() * view
}

pub struct ShadowPass {
    target: DepthTarget,
    projection: ShadowProjection,
    light_position: Option<Vector3<f32>>,
    light_space: Matrix4<f32>,
    state: ShadowState,
}

impl ShadowPass {
    /// Creates the depth target
    ///
    /// # Errors
    /// [`RenderError::IncompleteFramebuffer`] if the device cannot complete it.
    /// This is checked once, here.
    pub fn new(
        device: &mut dyn GpuDevice,
        resolution: u32,
        projection: ShadowProjection,
        light_position: Vector3<f32>,
    ) -> Result<Self, RenderError> {
        let target = device.create_depth_target(resolution, resolution)?;
        log::info!("Created {resolution}x{resolution} shadow map");
        let mut pass = Self {
            target,
            projection,
            light_position: None,
            light_space: Matrix4::from_scale(1.0),
            state: ShadowState::Idle,
        };
        pass.update_light_space_matrix(light_position);
        Ok(pass)
    }

    /// Recomputes the light-space matrix; returns whether it changed
    ///
    /// The matrix is a pure function of the light position, so an unchanged
    /// position leaves it untouched.
    pub fn update_light_space_matrix(&mut self, light_position: Vector3<f32>) -> bool {
        if self.light_position == Some(light_position) {
            return false;
        }
        self.light_position = Some(light_position);
        self.light_space = light_space_matrix(&self.projection, light_position);
        true
    }

    pub fn light_space_matrix(&self) -> Matrix4<f32> {
        self.light_space
    }

    pub fn state(&self) -> ShadowState {
        self.state
    }

    pub fn depth_texture(&self) -> TextureHandle {
        self.target.texture
    }

    pub fn resolution(&self) -> u32 {
        self.target.width
    }

    /// Binds the depth target and makes `depth_program` current with culling off
    pub fn start(
        &mut self,
        device: &mut dyn GpuDevice,
        depth_program: &ShaderProgram,
    ) -> Result<(), RenderError> {
        if self.state != ShadowState::Idle {
            return Err(RenderError::InvalidPassState("shadow capture already started"));
        }
        device.set_face_culling(false);
        depth_program.activate(device);
        device.set_mat4("lightSpaceMatrix", self.light_space);
        device.set_viewport(self.target.width, self.target.height);
        device.bind_framebuffer(Some(self.target.framebuffer));
        device.clear(ClearFlags::DEPTH);
        self.state = ShadowState::Capturing;
        Ok(())
    }

    /// Returns to the window target and hands the depth texture to `lighting_program`
    ///
    /// # Arguments
    /// * `main_viewport` - Window size to restore
    pub fn end(
        &mut self,
        device: &mut dyn GpuDevice,
        lighting_program: &ShaderProgram,
        main_viewport: (u32, u32),
    ) -> Result<(), RenderError> {
        if self.state != ShadowState::Capturing {
            return Err(RenderError::InvalidPassState("shadow capture was not started"));
        }
        device.bind_framebuffer(None);
        device.set_viewport(main_viewport.0, main_viewport.1);
        device.clear(ClearFlags::COLOR_DEPTH);
        lighting_program.activate(device);
        device.set_mat4("lightSpaceMatrix", self.light_space);
        device.set_int("shadowMap", SHADOW_UNIT as i32);
        device.bind_texture(SHADOW_UNIT, self.target.texture);
        device.set_face_culling(true);
        self.state = ShadowState::Idle;
        Ok(())
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        device.release_depth_target(&self.target);
    }
}

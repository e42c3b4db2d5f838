use cgmath::Vector3;

use super::light::{DirectionalLight, LightAnimation, LightState, PointLight};
use super::object::{Drawable, Updatable};
use crate::config::EngineConfig;
use crate::gfx::camera::{Camera, FrameInput};
use crate::gfx::device::GpuDevice;
use crate::gfx::error::RenderError;
use crate::gfx::rendering::shadow_pass::{ShadowPass, ShadowProjection};
use crate::gfx::rendering::skybox::Skybox;
use crate::gfx::resources::program::ScenePrograms;

/// Camera, lights, objects and the passes that draw them
///
/// Each frame: [`Scene::update`] with the frame's input, then
/// [`Scene::draw`], which captures the shadow map, clears the window, draws
/// the skybox and finally the lit objects.
pub struct Scene {
    pub camera: Camera,
    pub lights: LightState,
    pub light_animation: Option<LightAnimation>,
    objects: Vec<Box<dyn Drawable>>,
    shadow_pass: ShadowPass,
    skybox: Option<Skybox>,
    programs: ScenePrograms,
    viewport: (u32, u32),
    clear_color: [f32; 4],
    elapsed: f32,
}

impl Scene {
    /// Creates an empty scene sized to the device's current viewport
    ///
    /// # Errors
    /// Fails if the shadow depth target cannot be completed.
    pub fn new(
        device: &mut dyn GpuDevice,
        config: &EngineConfig,
        programs: ScenePrograms,
    ) -> Result<Self, RenderError> {
        let light_position = Vector3::from(config.light_position);
        let projection = ShadowProjection {
            half_extent: config.shadow.half_extent,
            near: config.shadow.near,
            far: config.shadow.far,
        };
        let shadow_pass = ShadowPass::new(device, config.shadow.resolution, projection, light_position)?;

        Ok(Self {
            camera: Camera::from_config(Vector3::new(0.0, 2.0, 8.0), config),
            lights: LightState::new(DirectionalLight::at(light_position)),
            light_animation: None,
            objects: Vec::new(),
            shadow_pass,
            skybox: None,
            programs,
            viewport: device.viewport(),
            clear_color: config.clear_color,
            elapsed: 0.0,
        })
    }

    pub fn add_object(&mut self, object: impl Drawable + 'static) {
        log::debug!("Added '{}' to scene", object.name());
        self.objects.push(Box::new(object));
    }

    pub fn objects(&self) -> &[Box<dyn Drawable>] {
        &self.objects
    }

    /// Replaces the skybox, releasing the previous one
    pub fn set_skybox(&mut self, device: &mut dyn GpuDevice, skybox: Skybox) {
        if let Some(mut old) = self.skybox.replace(skybox) {
            old.release(device);
        }
    }

    pub fn add_point_light(&mut self, light: PointLight) -> Result<usize, RenderError> {
        self.lights.add_point_light(light)
    }

    pub fn shadow_pass(&self) -> &ShadowPass {
        &self.shadow_pass
    }

    pub fn programs(&self) -> &ScenePrograms {
        &self.programs
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    /// Animates the light, refreshes the shadow matrix, then moves the camera
    pub fn update(&mut self, dt: f32, input: &FrameInput) {
        self.elapsed += dt;
        if let Some(animation) = self.light_animation {
            self.lights
                .global
                .set_position(animation.position_at(self.elapsed));
        }
        self.shadow_pass
            .update_light_space_matrix(self.lights.global.position);
        self.camera.update(dt, input);
    }

    /// Issues the frame's commands; the caller presents with `finish_frame`
    ///
    /// # Errors
    /// [`RenderError::DegenerateViewport`] for a zero-height viewport, in
    /// which case nothing is drawn.
    pub fn draw(&mut self, device: &mut dyn GpuDevice) -> Result<(), RenderError> {
        let (width, height) = self.viewport;
        let projection = self.camera.projection_matrix(width, height)?;
        let view = self.camera.view_matrix();
        device.set_clear_color(self.clear_color);

        self.shadow_pass.start(device, &self.programs.depth)?;
        for object in &self.objects {
            object.draw(device);
        }
        self.shadow_pass
            .end(device, &self.programs.lighting, self.viewport)?;

        if let Some(skybox) = &self.skybox {
            skybox.draw(device, &self.programs.skybox, view, projection);
            self.programs.lighting.activate(device);
        }

        device.set_mat4("viewProject", projection * view);
        device.set_mat4("view", view);
        device.set_mat4("projection", projection);
        device.set_vec3("viewPos", self.camera.position());
        self.lights.upload(device);
        for object in &self.objects {
            object.draw(device);
        }
        Ok(())
    }

    /// Releases every GPU resource the scene owns
    pub fn release(mut self, device: &mut dyn GpuDevice) {
        for object in &mut self.objects {
            object.release(device);
        }
        if let Some(skybox) = &mut self.skybox {
            skybox.release(device);
        }
        self.shadow_pass.release(device);
        self.programs.release(device);
    }
}

//! Light state uploaded to the lighting program

use cgmath::{InnerSpace, Vector3};

use crate::gfx::device::GpuDevice;
use crate::gfx::error::RenderError;

/// Size of the `pointLights` uniform array
pub const MAX_POINT_LIGHTS: usize = 4;

/// The shadow-casting global light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Where the shadow camera sits
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
}

impl DirectionalLight {
    /// A light at `position` shining toward the origin
    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            direction: toward_origin(position),
            ambient: Vector3::new(0.2, 0.2, 0.2),
            diffuse: Vector3::new(0.8, 0.8, 0.8),
            specular: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Moves the light and re-aims it at the origin
    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.direction = toward_origin(position);
    }

    fn upload(&self, device: &mut dyn GpuDevice) {
        device.set_vec3("globalLight.position", self.position);
        device.set_vec3("globalLight.direction", self.direction);
        device.set_vec3("globalLight.ambient", self.ambient);
        device.set_vec3("globalLight.diffuse", self.diffuse);
        device.set_vec3("globalLight.specular", self.specular);
    }
}

fn toward_origin(position: Vector3<f32>) -> Vector3<f32> {
    if position.magnitude2() > f32::EPSILON {
        -position.normalize()
    } else {
        Vector3::new(0.0, -1.0, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vector3<f32>,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl PointLight {
    /// White light with attenuation reaching roughly 50 units
    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            ambient: Vector3::new(0.05, 0.05, 0.05),
            diffuse: Vector3::new(0.8, 0.8, 0.8),
            specular: Vector3::new(1.0, 1.0, 1.0),
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }

    fn upload(&self, device: &mut dyn GpuDevice, index: usize) {
        let field = |name: &str| format!("pointLights[{index}].{name}");
        device.set_vec3(&field("position"), self.position);
        device.set_vec3(&field("ambient"), self.ambient);
        device.set_vec3(&field("diffuse"), self.diffuse);
        device.set_vec3(&field("specular"), self.specular);
        device.set_float(&field("constant"), self.constant);
        device.set_float(&field("linear"), self.linear);
        device.set_float(&field("quadratic"), self.quadratic);
    }
}

/// Time-varying motion applied to the global light
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightAnimation {
    /// Circle the world Y axis at `height`, `angular_speed` radians per second
    Orbit {
        radius: f32,
        height: f32,
        angular_speed: f32,
    },
}

impl LightAnimation {
    pub fn position_at(&self, time: f32) -> Vector3<f32> {
        match *self {
            LightAnimation::Orbit {
                radius,
                height,
                angular_speed,
            } => {
                let angle = time * angular_speed;
                Vector3::new(radius * angle.cos(), height, radius * angle.sin())
            }
        }
    }
}

/// Global light plus up to [`MAX_POINT_LIGHTS`] point lights
#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    pub global: DirectionalLight,
    point_lights: Vec<PointLight>,
}

impl LightState {
    pub fn new(global: DirectionalLight) -> Self {
        Self {
            global,
            point_lights: Vec::new(),
        }
    }

    pub fn add_point_light(&mut self, light: PointLight) -> Result<usize, RenderError> {
        if self.point_lights.len() >= MAX_POINT_LIGHTS {
            return Err(RenderError::TooManyPointLights {
                count: self.point_lights.len() + 1,
                max: MAX_POINT_LIGHTS,
            });
        }
        self.point_lights.push(light);
        Ok(self.point_lights.len() - 1)
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    /// Sets the `globalLight.*`, `pointLights[i].*` and `pointLightCount` uniforms
    pub fn upload(&self, device: &mut dyn GpuDevice) {
        self.global.upload(device);
        for (i, light) in self.point_lights.iter().enumerate() {
            light.upload(device, i);
        }
        device.set_int("pointLightCount", self.point_lights.len() as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::device::recording::RecordingDevice;
    use crate::gfx::device::Uniform;
    use crate::gfx::resources::program::{ProgramKind, ShaderProgram};

    #[test]
    fn test_point_light_limit() {
        let mut lights = LightState::new(DirectionalLight::at(Vector3::new(10.0, 100.0, 0.0)));
        for i in 0..MAX_POINT_LIGHTS {
            assert_eq!(lights.add_point_light(PointLight::at(Vector3::new(i as f32, 1.0, 0.0))).unwrap(), i);
        }
        let err = lights.add_point_light(PointLight::at(Vector3::new(0.0, 0.0, 0.0)));
        assert!(matches!(err, Err(RenderError::TooManyPointLights { max: MAX_POINT_LIGHTS, .. })));
        assert_eq!(lights.point_lights().len(), MAX_POINT_LIGHTS);
    }

    #[test]
    fn test_upload_names() {
        let mut device = RecordingDevice::new(64, 64);
        let program = ShaderProgram::builtin(&mut device, ProgramKind::Lighting).unwrap();
        let mut lights = LightState::new(DirectionalLight::at(Vector3::new(0.0, 10.0, 0.0)));
        lights.add_point_light(PointLight::at(Vector3::new(1.0, 2.0, 3.0))).unwrap();

        program.activate(&mut device);
        lights.upload(&mut device);

        let handle = program.handle();
        assert_eq!(
            device.uniform(handle, "globalLight.direction"),
            Some(Uniform::Vec3(Vector3::new(0.0, -1.0, 0.0)))
        );
        assert_eq!(
            device.uniform(handle, "pointLights[0].position"),
            Some(Uniform::Vec3(Vector3::new(1.0, 2.0, 3.0)))
        );
        assert_eq!(device.uniform(handle, "pointLights[0].quadratic"), Some(Uniform::Float(0.032)));
        assert_eq!(device.uniform(handle, "pointLightCount"), Some(Uniform::Int(1)));
    }

    #[test]
    fn test_orbit_keeps_height_and_radius() {
        let orbit = LightAnimation::Orbit {
            radius: 10.0,
            height: 50.0,
            angular_speed: 0.5,
        };
        for t in [0.0, 1.0, 7.5] {
            let p = orbit.position_at(t);
            assert_eq!(p.y, 50.0);
            assert!((Vector3::new(p.x, 0.0, p.z).magnitude() - 10.0).abs() < 1e-4);
        }
        assert_ne!(orbit.position_at(0.0), orbit.position_at(1.0));
    }
}

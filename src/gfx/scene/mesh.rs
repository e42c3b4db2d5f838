//! GPU-resident meshes drawn once per instance transform

use std::rc::Rc;

use cgmath::{Deg, Matrix4, Vector2, Vector3};

use super::transform::{Transform, WORLD_UP};
use super::vertex::MeshData;
use crate::gfx::device::{GpuDevice, MeshHandle};
use crate::gfx::error::RenderError;
use crate::gfx::resources::material::Material;

/// Which axes instance yaw and pitch rotate about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationAxes {
    /// The owning model's current up and right vectors, shared by all instances
    ParentBasis,
    /// World up for yaw, then the yawed local X axis for pitch, per instance
    #[default]
    InstanceBasis,
}

/// One placed copy of a mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceTransform {
    pub position: Vector3<f32>,
    /// `(yaw, pitch)` in degrees
    pub rotation: Vector2<f32>,
    pub scale: Vector3<f32>,
}

impl Default for InstanceTransform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector2::new(0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl InstanceTransform {
    pub fn new(position: Vector3<f32>, rotation: Vector2<f32>, scale: Vector3<f32>) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// translate · rotate(yaw) · rotate(pitch) · scale
    pub fn model_matrix(&self, axes: RotationAxes, parent: &Transform) -> Matrix4<f32> {
        let yaw = Deg(self.rotation.x);
        let pitch = Deg(self.rotation.y);
        let rotation = match axes {
            RotationAxes::ParentBasis => {
                Matrix4::from_axis_angle(parent.up(), yaw)
                    * Matrix4::from_axis_angle(parent.right(), pitch)
            }
            RotationAxes::InstanceBasis => {
                Matrix4::from_axis_angle(WORLD_UP, yaw) * Matrix4::from_angle_x(pitch)
            }
        };
        Matrix4::from_translation(self.position)
            * rotation
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

pub struct Mesh {
    name: String,
    handle: Option<MeshHandle>,
    index_count: u32,
    material: Rc<Material>,
    transforms: Vec<InstanceTransform>,
}

impl Mesh {
    /// Uploads `data` and binds the mesh to `material`
    pub fn new(
        device: &mut dyn GpuDevice,
        name: impl Into<String>,
        data: &MeshData,
        material: Rc<Material>,
    ) -> Result<Self, RenderError> {
        let name = name.into();
        data.validate(&name)?;
        let handle = device.create_mesh(&name, data)?;
        log::debug!(
            "Uploaded mesh '{}' ({} vertices, {} triangles)",
            name,
            data.vertex_count(),
            data.indices.len() / 3
        );
        Ok(Self {
            name,
            handle: Some(handle),
            index_count: data.index_count(),
            material,
            transforms: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn material(&self) -> &Rc<Material> {
        &self.material
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Replaces the whole instance list
    pub fn set_transforms(&mut self, transforms: Vec<InstanceTransform>) {
        self.transforms = transforms;
    }

    pub fn transforms(&self) -> &[InstanceTransform] {
        &self.transforms
    }

    /// One draw call per instance; nothing at all for an empty instance list
    pub fn draw(&self, device: &mut dyn GpuDevice, parent: &Transform, axes: RotationAxes) {
        let Some(handle) = self.handle else {
            log::warn!("Skipping draw of released mesh '{}'", self.name);
            return;
        };
        if self.transforms.is_empty() {
            return;
        }

        device.bind_mesh(handle);
        self.material.bind(device);
        for instance in &self.transforms {
            device.set_mat4("model", instance.model_matrix(axes, parent));
            device.draw_indexed(self.index_count, 1);
        }
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some(handle) = self.handle.take() {
            device.release_mesh(handle);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gfx::device::recording::{Command, RecordingDevice};
    use crate::gfx::device::Uniform;
    use crate::gfx::geometry::generate_cube;
    use crate::gfx::resources::material::MaterialDescriptor;
    use crate::gfx::resources::texture_cache::{tests::texture_dir, TextureCache};
    use cgmath::SquareMatrix;

    const EPSILON: f32 = 1e-4;

    pub(crate) fn test_material(device: &mut RecordingDevice, name: &str) -> Rc<Material> {
        let dir = texture_dir(name, &["albedo.png"]);
        let mut cache = TextureCache::new(&dir);
        Material::shared(&mut cache, device, &MaterialDescriptor::new("albedo.png")).unwrap()
    }

    fn matrices_close(a: Matrix4<f32>, b: Matrix4<f32>) -> bool {
        let a: [[f32; 4]; 4] = a.into();
        let b: [[f32; 4]; 4] = b.into();
        a.iter()
            .flatten()
            .zip(b.iter().flatten())
            .all(|(x, y)| (x - y).abs() < EPSILON)
    }

    #[test]
    fn test_one_draw_per_instance() {
        let mut device = RecordingDevice::new(800, 600);
        let material = test_material(&mut device, "mesh-draws");
        let mut mesh = Mesh::new(&mut device, "cube", &generate_cube(), material).unwrap();
        mesh.set_transforms(vec![
            InstanceTransform::at(Vector3::new(0.0, 0.0, 0.0)),
            InstanceTransform::at(Vector3::new(1.0, 1.0, 1.0)),
        ]);

        mesh.draw(&mut device, &Transform::default(), RotationAxes::InstanceBasis);

        let draws: Vec<_> = device
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .collect();
        assert_eq!(draws.len(), 2);
        let binds = device
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::BindMesh(_)))
            .count();
        assert_eq!(binds, 1);
    }

    #[test]
    fn test_empty_instance_list_draws_nothing() {
        let mut device = RecordingDevice::new(800, 600);
        let material = test_material(&mut device, "mesh-empty");
        let mesh = Mesh::new(&mut device, "cube", &generate_cube(), material).unwrap();
        device.clear_commands();

        mesh.draw(&mut device, &Transform::default(), RotationAxes::InstanceBasis);
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_model_uniform_set_before_each_draw() {
        let mut device = RecordingDevice::new(800, 600);
        let material = test_material(&mut device, "mesh-model");
        let mut mesh = Mesh::new(&mut device, "cube", &generate_cube(), material).unwrap();
        let position = Vector3::new(3.0, 0.0, -2.0);
        mesh.set_transforms(vec![InstanceTransform::at(position)]);

        mesh.draw(&mut device, &Transform::default(), RotationAxes::InstanceBasis);

        let draw_at = device
            .position_of(|c| matches!(c, Command::DrawIndexed { .. }))
            .unwrap();
        let model = device.commands()[..draw_at].iter().rev().find_map(|c| match c {
            Command::SetUniform { name, value: Uniform::Mat4(m), .. } if name == "model" => Some(*m),
            _ => None,
        });
        assert!(matrices_close(model.unwrap(), Matrix4::from_translation(position)));
    }

    #[test]
    fn test_released_mesh_is_skipped() {
        let mut device = RecordingDevice::new(800, 600);
        let material = test_material(&mut device, "mesh-release");
        let mut mesh = Mesh::new(&mut device, "cube", &generate_cube(), material).unwrap();
        mesh.set_transforms(vec![InstanceTransform::default()]);

        mesh.release(&mut device);
        mesh.release(&mut device);
        assert!(mesh.is_released());
        assert_eq!(device.live_meshes(), 0);

        device.clear_commands();
        mesh.draw(&mut device, &Transform::default(), RotationAxes::InstanceBasis);
        assert!(device.commands().is_empty());
    }

    #[test]
    fn test_rotation_axes_agree_for_default_parent() {
        let instance = InstanceTransform::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector2::new(30.0, 20.0),
            Vector3::new(1.0, 2.0, 1.0),
        );
        let parent = Transform::default();
        assert!(matrices_close(
            instance.model_matrix(RotationAxes::ParentBasis, &parent),
            instance.model_matrix(RotationAxes::InstanceBasis, &parent),
        ));
    }

    #[test]
    fn test_instance_basis_ignores_parent_rotation() {
        let instance = InstanceTransform::new(
            Vector3::new(0.0, 0.0, 0.0),
            Vector2::new(90.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        );
        let mut parent = Transform::default();
        let independent = instance.model_matrix(RotationAxes::InstanceBasis, &parent);
        parent.set_rotation(Vector2::new(-90.0, 60.0));

        assert!(matrices_close(
            independent,
            instance.model_matrix(RotationAxes::InstanceBasis, &parent)
        ));
        assert!(!matrices_close(
            independent,
            instance.model_matrix(RotationAxes::ParentBasis, &parent)
        ));
        assert!(!matrices_close(independent, Matrix4::identity()));
    }
}

//! # Scene Management Module
//!
//! Everything a frame draws: meshes and the models that group them, the lights
//! and the [`Scene`] that owns them together with the camera, shadow pass and
//! skybox.
//!
//! ## Key Components
//!
//! - [`Scene`] - Owns objects, lights and camera; runs the per-frame draw order
//! - [`Model`] - Named group of meshes placed through one [`Transform`]
//! - [`Mesh`] - Uploaded geometry plus its material and instance placements
//! - [`MeshData`] - CPU-side vertex streams and indices
//! - [`LightState`] - The directional light and up to four point lights
//!
//! Objects are added as boxed [`Drawable`]s, so anything that can draw itself
//! through a [`GpuDevice`](crate::gfx::device::GpuDevice) can live in a scene.

pub mod light;
pub mod mesh;
pub mod model;
pub mod object;
pub mod scene;
pub mod transform;
pub mod vertex;

// Re-export main types
pub use light::{DirectionalLight, LightAnimation, LightState, PointLight, MAX_POINT_LIGHTS};
pub use mesh::{InstanceTransform, Mesh, RotationAxes};
pub use model::{Model, ModelDocument};
pub use object::{Drawable, Updatable};
pub use scene::Scene;
pub use transform::Transform;
pub use vertex::MeshData;

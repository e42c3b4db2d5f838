//! # Umbra Prelude
//!
//! The types a typical scene setup needs, in one import:
//!
//! ```no_run
//! use umbra::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging();
//!     let config = EngineConfig::load_or_default("umbra.toml")?;
//!     UmbraApp::new(config)?
//!         .with_setup(|ctx| {
//!             let floor = generate_plane(20.0, 20.0, 1, 1);
//!             let material = Material::shared(ctx.textures, ctx.device, &MaterialDescriptor::new("wood.png"))?;
//!             let model = Model::from_meshes(ctx.device, "floor", vec![(floor, material)])?;
//!             ctx.scene.add_object(model);
//!             Ok(())
//!         })
//!         .run()
//! }
//! ```

pub use crate::app::{init_logging, SceneContext, UmbraApp};
pub use crate::config::EngineConfig;
pub use crate::gfx::camera::Camera;
pub use crate::gfx::device::GpuDevice;
pub use crate::gfx::error::RenderError;
pub use crate::gfx::geometry::{generate_cube, generate_plane};
pub use crate::gfx::rendering::{Skybox, SkyboxFaces};
pub use crate::gfx::resources::{Material, MaterialDescriptor, TextureCache};
pub use crate::gfx::scene::{
    DirectionalLight, Drawable, InstanceTransform, LightAnimation, Mesh, MeshData, Model, PointLight,
    Scene, Transform, Updatable,
};

pub use cgmath::{Vector2, Vector3};

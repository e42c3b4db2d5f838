// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Shader programs, decoded and uploaded textures, and the materials that bind
//! them to fixed texture units.

pub mod material;
pub mod program;
pub mod texture_cache;
pub mod texture_resource;

// Re-export main types
pub use material::{Material, MaterialDescriptor};
pub use program::{ProgramKind, ProgramSource, ScenePrograms, ShaderProgram};
pub use texture_cache::{Texture, TextureCache};
pub use texture_resource::TextureResource;

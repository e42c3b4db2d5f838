// src/lib.rs
//! Umbra 3D Renderer
//!
//! A real-time scene renderer built on wgpu and winit: textured, normal- and
//! parallax-mapped meshes lit by one shadow-casting directional light and up
//! to four point lights, under a cube-map skybox, explored with a fly camera.

pub mod app;
pub mod config;
pub mod gfx;
pub mod prelude;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::{init_logging, SceneContext, UmbraApp};
pub use config::EngineConfig;
pub use gfx::error::RenderError;

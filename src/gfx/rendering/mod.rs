// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! The wgpu implementation of [`GpuDevice`](crate::gfx::device::GpuDevice)
//! and the two render passes the scene composes each frame: shadow capture and
//! the skybox.

pub mod pipeline_manager;
pub mod render_engine;
pub mod shadow_pass;
pub mod skybox;
pub mod uniform_layout;

// Re-export main types
pub use pipeline_manager::{PipelineKey, PipelineManager};
pub use render_engine::RenderEngine;
pub use shadow_pass::{ShadowPass, ShadowProjection, ShadowState};
pub use skybox::{Skybox, SkyboxFaces};

//! Small wgpu helpers shared by the render engine

pub mod binding_types;
pub mod uniform_buffer;

pub use uniform_buffer::{DynamicUniformBuffer, UniformRing};

//! # Graphics Module
//!
//! All rendering functionality of umbra: the GPU abstraction, the wgpu
//! backend, resource loading and scene management.
//!
//! ## Architecture Overview
//!
//! - **Device** ([`device`]) - The [`GpuDevice`] trait every draw goes through,
//!   plus a recording implementation for tests
//! - **Rendering** ([`rendering`]) - [`RenderEngine`], shadow mapping and the skybox
//! - **Resources** ([`resources`]) - Programs, textures and materials
//! - **Scene** ([`scene`]) - Meshes, models, lights and the frame draw order
//! - **Camera** ([`camera`]) - First-person fly camera and its input mapping
//! - **Geometry** ([`geometry`]) - Procedural cubes and planes, tangent generation
//!
//! ## Usage
//!
//! ```no_run
//! use umbra::gfx::device::recording::RecordingDevice;
//! use umbra::gfx::geometry::generate_cube;
//!
//! let mut device = RecordingDevice::new(800, 600);
//! let cube = generate_cube();
//! assert!(cube.validate("cube").is_ok());
//! # let _ = &mut device;
//! ```

pub mod camera;
pub mod device;
pub mod error;
pub mod geometry;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::{Camera, CameraController};
pub use device::GpuDevice;
pub use error::RenderError;
pub use rendering::RenderEngine;
pub use scene::Scene;

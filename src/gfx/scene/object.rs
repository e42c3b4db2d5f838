//! Capabilities shared by scene objects
//!
//! Scene objects are composed from a [`super::transform::Transform`] and
//! implement whichever of these traits they need.

use crate::gfx::camera::input::FrameInput;
use crate::gfx::device::GpuDevice;

/// Something that issues draw calls with the currently active program
pub trait Drawable {
    fn draw(&self, device: &mut dyn GpuDevice);

    /// Releases owned GPU resources; drawing afterwards is a no-op
    fn release(&mut self, device: &mut dyn GpuDevice);

    fn name(&self) -> &str {
        "object"
    }
}

/// Something advanced once per frame
pub trait Updatable {
    fn update(&mut self, dt: f32, input: &FrameInput);
}

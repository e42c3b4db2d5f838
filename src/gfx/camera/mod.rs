pub mod camera_controller;
pub mod fly_camera;
pub mod input;

// Re-export main types
pub use camera_controller::CameraController;
pub use fly_camera::{Camera, PITCH_LIMIT};
pub use input::{FrameInput, Movement};

use winit::{
    event::{DeviceEvent, ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use super::input::{FrameInput, Movement};

/// Translates winit events into one [`FrameInput`] per frame
///
/// Key state is held across frames; mouse motion accumulates until
/// [`CameraController::take_frame_input`] drains it.
#[derive(Debug, Default)]
pub struct CameraController {
    movement: Movement,
    look: (f32, f32),
    quit: bool,
    mouse_touched: bool,
}

impl CameraController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_events(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.process_mouse_motion(delta.0 as f32, delta.1 as f32);
        }
    }

    /// Accumulates raw motion, window convention (y grows downwards)
    pub fn process_mouse_motion(&mut self, dx: f32, dy: f32) {
        // first sample after (re)focus is a jump, not a look
        if !self.mouse_touched {
            self.mouse_touched = true;
            return;
        }
        self.look.0 += dx;
        self.look.1 -= dy;
    }

    pub fn process_keyed_events(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(code) = event.physical_key {
            self.process_key(code, event.state == ElementState::Pressed);
        }
    }

    pub fn process_key(&mut self, code: KeyCode, pressed: bool) {
        let flag = match code {
            KeyCode::KeyW => Movement::FORWARD,
            KeyCode::KeyS => Movement::BACKWARD,
            KeyCode::KeyA => Movement::LEFT,
            KeyCode::KeyD => Movement::RIGHT,
            KeyCode::Space => Movement::UP,
            KeyCode::ShiftLeft => Movement::DOWN,
            KeyCode::Escape => {
                if pressed {
                    self.quit = true;
                }
                return;
            }
            _ => return,
        };
        self.movement.set(flag, pressed);
    }

    /// Focus changes reset held keys and first-touch tracking
    pub fn focus_changed(&mut self, focused: bool) {
        if !focused {
            self.movement = Movement::empty();
        }
        self.mouse_touched = false;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn take_frame_input(&mut self) -> FrameInput {
        let input = FrameInput {
            movement: self.movement,
            look: self.look,
            quit: self.quit,
        };
        self.look = (0.0, 0.0);
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_mouse_sample_discarded() {
        let mut controller = CameraController::new();
        controller.process_mouse_motion(100.0, 100.0);
        controller.process_mouse_motion(3.0, 4.0);
        let input = controller.take_frame_input();
        assert_eq!(input.look, (3.0, -4.0));
    }

    #[test]
    fn test_look_drained_but_keys_held() {
        let mut controller = CameraController::new();
        controller.process_key(KeyCode::KeyW, true);
        controller.process_key(KeyCode::KeyD, true);
        controller.process_mouse_motion(0.0, 0.0);
        controller.process_mouse_motion(2.0, 0.0);

        let first = controller.take_frame_input();
        assert!(first.movement.contains(Movement::FORWARD | Movement::RIGHT));
        assert_eq!(first.look, (2.0, 0.0));

        let second = controller.take_frame_input();
        assert!(second.movement.contains(Movement::FORWARD));
        assert_eq!(second.look, (0.0, 0.0));

        controller.process_key(KeyCode::KeyW, false);
        assert!(!controller.take_frame_input().movement.contains(Movement::FORWARD));
    }

    #[test]
    fn test_escape_requests_quit() {
        let mut controller = CameraController::new();
        controller.process_key(KeyCode::Escape, true);
        assert!(controller.quit_requested());
        assert!(controller.take_frame_input().quit);
    }

    #[test]
    fn test_focus_loss_releases_keys() {
        let mut controller = CameraController::new();
        controller.process_key(KeyCode::Space, true);
        controller.focus_changed(false);
        assert!(controller.take_frame_input().movement.is_empty());
    }
}

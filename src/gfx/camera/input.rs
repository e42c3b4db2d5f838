//! Per-frame input snapshot
//!
//! The window layer collects key state and mouse motion and hands one
//! [`FrameInput`] to the scene per frame, by value.

use bitflags::bitflags;

bitflags! {
    /// Set of active movement directions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Movement: u8 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
    }
}

/// Input gathered over one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameInput {
    pub movement: Movement,
    /// Mouse delta `(dx, dy)` with `dy` positive when moving up
    pub look: (f32, f32),
    pub quit: bool,
}

impl FrameInput {
    pub fn moving(movement: Movement) -> Self {
        Self {
            movement,
            ..Default::default()
        }
    }

    pub fn looking(dx: f32, dy: f32) -> Self {
        Self {
            look: (dx, dy),
            ..Default::default()
        }
    }
}

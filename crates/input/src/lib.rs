//! Input handling for keyboard and mouse.
//!
//! The simulation never sees raw events. The shell feeds events into an
//! [`InputState`] and samples one [`Controls`] value per tick.

use glam::Vec2;
use std::collections::HashSet;

/// Discrete look keys (arrow keys by default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookKeys {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Everything the simulation reads from the player in one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Controls {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    /// Jump was pressed this tick.
    pub jump: bool,
    /// Trigger is held. Fire rate is enforced by the weapon.
    pub shoot: bool,
    /// Weapon switch was pressed this tick.
    pub switch_weapon: bool,
    /// Reload was pressed this tick.
    pub reload: bool,
    /// Pointer movement in pixels since the previous tick.
    pub look_delta: Vec2,
    pub look_keys: LookKeys,
    /// Pointer deltas are only honoured while the cursor is captured.
    pub pointer_captured: bool,
}

impl Controls {
    /// Local movement vector: x = strafe right, y = forward. Not normalised.
    pub fn movement_axes(&self) -> Vec2 {
        let mut movement = Vec2::ZERO;
        if self.forward {
            movement.y += 1.0;
        }
        if self.backward {
            movement.y -= 1.0;
        }
        if self.left {
            movement.x -= 1.0;
        }
        if self.right {
            movement.x += 1.0;
        }
        movement
    }
}

/// Manages input state for the current frame.
#[derive(Debug, Default)]
pub struct InputState {
    /// Keys currently held down.
    keys_held: HashSet<KeyCode>,
    /// Keys pressed this frame.
    keys_pressed: HashSet<KeyCode>,

    /// Mouse buttons currently held.
    mouse_held: HashSet<MouseButton>,

    /// Mouse movement delta this frame.
    mouse_delta: Vec2,
    /// Accumulated mouse delta (for when cursor is locked).
    accumulated_delta: Vec2,

    /// Whether the cursor is captured/locked.
    cursor_locked: bool,

    /// Mouse wheel moved this frame (either direction switches weapon).
    scrolled: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame state. Call at the start of each frame.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.mouse_delta = self.accumulated_delta;
        self.accumulated_delta = Vec2::ZERO;
        self.scrolled = false;
    }

    /// Process a keyboard event.
    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.keys_held.contains(&key) {
                    self.keys_pressed.insert(key);
                }
                self.keys_held.insert(key);
            }
            ElementState::Released => {
                self.keys_held.remove(&key);
            }
        }
    }

    /// Process a mouse button event.
    pub fn process_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.mouse_held.insert(button);
            }
            ElementState::Released => {
                self.mouse_held.remove(&button);
            }
        }
    }

    /// Process raw mouse movement. Ignored while the cursor is free.
    pub fn process_mouse_motion(&mut self, delta: (f64, f64)) {
        if !self.cursor_locked {
            return;
        }
        self.accumulated_delta.x += delta.0 as f32;
        self.accumulated_delta.y += delta.1 as f32;
    }

    pub fn process_scroll(&mut self) {
        self.scrolled = true;
    }

    /// Set cursor lock state. Releasing the cursor drops held buttons so a
    /// trigger held during a focus change does not keep firing.
    pub fn set_cursor_locked(&mut self, locked: bool) {
        self.cursor_locked = locked;
        if !locked {
            self.mouse_held.clear();
            self.accumulated_delta = Vec2::ZERO;
        }
    }

    pub fn is_cursor_locked(&self) -> bool {
        self.cursor_locked
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    pub fn is_mouse_held(&self, button: MouseButton) -> bool {
        self.mouse_held.contains(&button)
    }

    /// Sample the controls for this tick.
    pub fn controls(&self) -> Controls {
        Controls {
            forward: self.is_key_held(KeyCode::KeyW),
            backward: self.is_key_held(KeyCode::KeyS),
            left: self.is_key_held(KeyCode::KeyA),
            right: self.is_key_held(KeyCode::KeyD),
            sprint: self.is_key_held(KeyCode::ShiftLeft) || self.is_key_held(KeyCode::ShiftRight),
            jump: self.is_key_pressed(KeyCode::Space),
            shoot: self.cursor_locked && self.is_mouse_held(MouseButton::Left),
            switch_weapon: self.is_key_pressed(KeyCode::KeyQ) || self.scrolled,
            reload: self.is_key_pressed(KeyCode::KeyR),
            look_delta: self.mouse_delta,
            look_keys: LookKeys {
                up: self.is_key_held(KeyCode::ArrowUp),
                down: self.is_key_held(KeyCode::ArrowDown),
                left: self.is_key_held(KeyCode::ArrowLeft),
                right: self.is_key_held(KeyCode::ArrowRight),
            },
            pointer_captured: self.cursor_locked,
        }
    }
}

// Re-export for convenience
pub use winit::event::{ElementState, MouseButton};
pub use winit::keyboard::KeyCode;

//! Read-only views of the simulation for the presentation shell.

use bytemuck::{Pod, Zeroable};
use engine_core::{Quat, Transform, TransformRaw, Vec3};
use procgen::{ObstacleShape, ZombieKind};

use crate::weapons::WeaponKind;

/// Coarse game phase for menus and overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudPhase {
    /// Built but not started.
    Ready,
    Playing,
    WaveCleared,
    Paused,
    GameOver,
}

/// Everything the HUD draws.
#[derive(Debug, Clone, PartialEq)]
pub struct HudState {
    pub score: u64,
    pub high_score: u64,
    pub wave: u32,
    pub health: f32,
    pub zombies_remaining: usize,
    pub wave_message: String,
    pub player_message: String,
    pub ammo: u32,
    pub reserve_ammo: u32,
    pub reloading: bool,
    pub weapon: WeaponKind,
    /// Damage overlay is showing.
    pub damaged: bool,
    pub phase: HudPhase,
}

/// Per-instance data for GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceData {
    /// Model matrix (4x4)
    pub model: [[f32; 4]; 4],
    /// Color tint
    pub color: [f32; 4],
}

impl InstanceData {
    pub fn new(transform: &Transform, color: [f32; 4]) -> Self {
        Self {
            model: TransformRaw::from(transform).model,
            color,
        }
    }
}

/// Flashing zombies render white.
pub const FLASH_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

pub fn zombie_color(kind: ZombieKind) -> [f32; 4] {
    match kind {
        ZombieKind::Walker => [0.35, 0.55, 0.3, 1.0],
        ZombieKind::Runner => [0.6, 0.45, 0.25, 1.0],
        ZombieKind::Brute => [0.45, 0.15, 0.15, 1.0],
        ZombieKind::Clicker => [0.5, 0.5, 0.6, 1.0],
    }
}

pub fn obstacle_color(shape: ObstacleShape) -> [f32; 4] {
    match shape {
        ObstacleShape::Wall => [0.4, 0.4, 0.42, 1.0],
        ObstacleShape::Box => [0.55, 0.4, 0.25, 1.0],
        ObstacleShape::Sphere => [0.5, 0.5, 0.5, 1.0],
        ObstacleShape::Cone => [0.6, 0.35, 0.2, 1.0],
        ObstacleShape::Cylinder => [0.3, 0.35, 0.45, 1.0],
    }
}

/// One obstacle instance plus its shape, so the shell can pick a mesh.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleInstance {
    pub shape: ObstacleShape,
    pub instance: InstanceData,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    /// Camera at the player's eye, looking along the view direction.
    pub camera: TransformRaw,
    pub camera_position: Vec3,
    pub camera_forward: Vec3,
    pub zombies: Vec<InstanceData>,
    pub obstacles: Vec<ObstacleInstance>,
    pub tracers: Vec<InstanceData>,
    pub pickups: Vec<InstanceData>,
}

impl RenderFrame {
    pub fn camera_transform(eye: Vec3, yaw: f32, pitch: f32) -> Transform {
        Transform {
            position: eye,
            rotation: Quat::from_rotation_y(yaw) * Quat::from_rotation_x(pitch),
            scale: Vec3::ONE,
        }
    }

    /// The zombie instances as raw bytes for a vertex buffer.
    pub fn zombie_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.zombies)
    }
}

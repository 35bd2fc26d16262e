//! Events emitted by a simulation tick for the presentation shell.

use hecs::Entity;
use procgen::ZombieKind;

use crate::pickup::PickupKind;
use crate::weapons::WeaponKind;

/// Something that happened during a tick. The shell plays sounds, shows
/// notifications and updates menus from these.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A generation request went out to the wave backend.
    GenerationRequested { wave: u32 },
    WaveStarted { wave: u32, zombies: usize, message: String },
    WaveCleared { wave: u32 },
    /// Non-fatal. The wave state did not advance.
    GenerationFailed { wave: u32, error: String, will_retry: bool },
    ShotFired { weapon: WeaponKind, hit: Option<Entity> },
    ZombieHit { entity: Entity, damage: f32, remaining: f32 },
    ZombieKilled { entity: Entity, kind: ZombieKind, points: u64 },
    PlayerDamaged { amount: f32, health: f32 },
    PickupSpawned { kind: PickupKind },
    PickupCollected { kind: PickupKind },
    ReloadStarted { weapon: WeaponKind },
    ReloadFinished { weapon: WeaponKind },
    WeaponSwitched { weapon: WeaponKind },
    NewHighScore { score: u64 },
    GameOver { score: u64, wave: u32 },
}

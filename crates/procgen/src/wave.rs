//! Deterministic zombie wave generation.
//!
//! Difficulty sets the base head count; every wave after the first adds 15 %
//! on top of it. Each zombie rolls its kind from a fixed 60/30/10 mix and
//! gets jittered health and speed that also grow slowly with the wave number.

use engine_core::Vec3;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Head-count growth per wave after the first.
const WAVE_GROWTH: f64 = 0.15;
/// Health growth per wave.
const HEALTH_PER_WAVE: f32 = 0.05;
/// Speed growth per wave.
const SPEED_PER_WAVE: f32 = 0.02;
/// Upper bound of the random health bonus.
const HEALTH_JITTER: f32 = 0.25;
/// Upper bound of the random speed bonus.
const SPEED_JITTER: f32 = 0.15;

/// Game difficulty selected at the start menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Zombies in wave 1.
    pub fn base_count(&self) -> u32 {
        match self {
            Difficulty::Easy => 6,
            Difficulty::Normal => 12,
            Difficulty::Hard => 22,
        }
    }
}

/// Zombie archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZombieKind {
    /// Common, slow and weak.
    Walker,
    /// Fast and fragile.
    Runner,
    /// Rare, slow and tough.
    Brute,
    /// Only produced by generative wave services.
    Clicker,
}

impl ZombieKind {
    pub fn base_health(&self) -> f32 {
        match self {
            ZombieKind::Walker => 30.0,
            ZombieKind::Runner => 20.0,
            ZombieKind::Brute => 80.0,
            ZombieKind::Clicker => 45.0,
        }
    }

    /// Units per 1/60 s reference frame.
    pub fn base_speed(&self) -> f32 {
        match self {
            ZombieKind::Walker => 0.03,
            ZombieKind::Runner => 0.05,
            ZombieKind::Brute => 0.02,
            ZombieKind::Clicker => 0.04,
        }
    }

    /// Half extents of the collision and hit box.
    pub fn half_extents(&self) -> Vec3 {
        match self {
            ZombieKind::Walker | ZombieKind::Clicker => Vec3::new(0.5, 1.0, 0.5),
            ZombieKind::Runner => Vec3::new(0.4, 0.9, 0.4),
            ZombieKind::Brute => Vec3::new(0.8, 1.3, 0.8),
        }
    }

    /// Damage per contact hit on the player.
    pub fn melee_damage(&self) -> f32 {
        match self {
            ZombieKind::Brute => 15.0,
            _ => 10.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ZombieKind::Walker => "walker",
            ZombieKind::Runner => "runner",
            ZombieKind::Brute => "brute",
            ZombieKind::Clicker => "clicker",
        }
    }
}

/// Stats for one zombie of a wave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZombieDescriptor {
    #[serde(rename = "type")]
    pub kind: ZombieKind,
    pub health: f32,
    pub speed: f32,
}

/// Player-performance signals a generator may take into account.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaveContext {
    pub difficulty: Difficulty,
    pub player_score: u64,
    pub time_survived: f32,
    pub player_health: f32,
}

/// Output of a wave generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedWave {
    pub zombies: Vec<ZombieDescriptor>,
    pub message: String,
}

impl GeneratedWave {
    pub fn is_empty(&self) -> bool {
        self.zombies.is_empty()
    }
}

/// Number of zombies in `wave` before any per-zombie rolls.
pub fn zombie_count(wave: u32, difficulty: Difficulty) -> usize {
    if wave == 0 {
        return 0;
    }
    let base = f64::from(difficulty.base_count());
    (base * (1.0 + f64::from(wave - 1) * WAVE_GROWTH)).ceil() as usize
}

/// Roll a kind from the 60 % walker / 30 % runner / 10 % brute mix.
pub fn pick_kind<R: Rng + ?Sized>(rng: &mut R) -> ZombieKind {
    let roll = rng.gen::<f32>();
    if roll < 0.6 {
        ZombieKind::Walker
    } else if roll < 0.9 {
        ZombieKind::Runner
    } else {
        ZombieKind::Brute
    }
}

/// Roll one zombie of `kind` for `wave`.
pub fn roll_descriptor<R: Rng + ?Sized>(kind: ZombieKind, wave: u32, rng: &mut R) -> ZombieDescriptor {
    let w = wave as f32;
    let health = (kind.base_health()
        * (1.0 + rng.gen::<f32>() * HEALTH_JITTER)
        * (1.0 + w * HEALTH_PER_WAVE))
        .ceil();
    let speed = kind.base_speed() * (1.0 + rng.gen::<f32>() * SPEED_JITTER + w * SPEED_PER_WAVE);
    ZombieDescriptor { kind, health, speed }
}

/// Generate the roster for `wave`. Wave 0 is the empty setup wave.
pub fn generate_wave<R: Rng + ?Sized>(wave: u32, context: &WaveContext, rng: &mut R) -> GeneratedWave {
    if wave == 0 {
        return GeneratedWave::default();
    }

    let count = zombie_count(wave, context.difficulty);
    let zombies = (0..count)
        .map(|_| {
            let kind = pick_kind(rng);
            roll_descriptor(kind, wave, rng)
        })
        .collect();

    GeneratedWave {
        zombies,
        message: format!("Wave {}: Here they come!", wave),
    }
}

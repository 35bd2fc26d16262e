//! Common ECS components used across the engine.

use glam::Vec3;

/// Velocity component for moving entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub linear: Vec3,
}

impl Velocity {
    pub fn new(linear: Vec3) -> Self {
        Self { linear }
    }
}

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Subtract `amount`, flooring at zero. Returns the damage actually applied.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        let before = self.current;
        self.current = (self.current - amount.max(0.0)).max(0.0);
        before - self.current
    }

    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// AI state for enemies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AIState {
    #[default]
    Chasing,
    Attacking,
    Dead,
}

/// Countdown that gates a repeating action (fire rate, contact damage).
#[derive(Debug, Clone, Copy)]
pub struct Cooldown {
    pub interval: f32,
    pub remaining: f32,
}

impl Cooldown {
    /// A cooldown that is ready immediately.
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            remaining: 0.0,
        }
    }

    pub fn is_ready(&self) -> bool {
        // Tolerate float drift from summing many small frame deltas.
        self.remaining <= 1e-5
    }

    /// Start a new interval.
    pub fn trigger(&mut self) {
        self.remaining = self.interval;
    }

    pub fn update(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }
}

/// Lifetime component for temporary entities (tracers, pickups).
#[derive(Debug, Clone, Copy)]
pub struct Lifetime {
    pub remaining: f32,
}

impl Lifetime {
    pub fn new(seconds: f32) -> Self {
        Self { remaining: seconds }
    }

    /// Tick down. Returns true once the lifetime has run out.
    pub fn update(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining <= 0.0
    }
}

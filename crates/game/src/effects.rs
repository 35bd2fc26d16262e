//! Timed visual feedback: hit flashes, the damage overlay, on-screen
//! messages and bullet tracers.
//!
//! Everything here is plain state advanced once per tick. Nothing is
//! scheduled for later, so an effect can never outlive the entity it
//! belongs to.

use engine_core::{Lifetime, Quat, Transform, Vec3, Velocity};
use hecs::{Entity, World};

/// How long a zombie flashes after being hit.
pub const HIT_FLASH_SECONDS: f32 = 0.1;
/// How long the red damage overlay stays up.
pub const DAMAGE_OVERLAY_SECONDS: f32 = 0.5;
pub const BANNER_SECONDS: f32 = 4.0;
pub const TOAST_SECONDS: f32 = 4.0;
pub const TRACER_SPEED: f32 = 80.0;
pub const TRACER_LIFETIME: f32 = 2.0;

/// Hit flash on a zombie entity. Removed when it runs out.
#[derive(Debug, Clone, Copy)]
pub struct HitFlash {
    pub remaining: f32,
}

/// Visual-only bullet tracer. Lives next to `Transform`, `Velocity` and `Lifetime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracer;

/// On-screen message with a countdown.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedMessage {
    pub text: String,
    pub time_remaining: f32,
}

/// Screen-space effects owned by the session.
#[derive(Debug, Clone, Default)]
pub struct Effects {
    wave_banner: Option<TimedMessage>,
    player_toast: Option<TimedMessage>,
    damage_overlay: f32,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Large wave message ("Wave 3: Here they come!").
    pub fn banner(&mut self, text: impl Into<String>) {
        self.wave_banner = Some(TimedMessage {
            text: text.into(),
            time_remaining: BANNER_SECONDS,
        });
    }

    /// Small player notification (pickups, failures).
    pub fn toast(&mut self, text: impl Into<String>) {
        self.player_toast = Some(TimedMessage {
            text: text.into(),
            time_remaining: TOAST_SECONDS,
        });
    }

    pub fn player_damaged(&mut self) {
        self.damage_overlay = DAMAGE_OVERLAY_SECONDS;
    }

    pub fn wave_message(&self) -> &str {
        self.wave_banner.as_ref().map_or("", |m| m.text.as_str())
    }

    pub fn player_message(&self) -> &str {
        self.player_toast.as_ref().map_or("", |m| m.text.as_str())
    }

    pub fn damage_overlay_active(&self) -> bool {
        self.damage_overlay > 0.0
    }

    /// Advance every timer, including per-entity flashes and tracers.
    pub fn update(&mut self, world: &mut World, dt: f32) {
        self.damage_overlay = (self.damage_overlay - dt).max(0.0);
        tick_message(&mut self.wave_banner, dt);
        tick_message(&mut self.player_toast, dt);
        update_flashes(world, dt);
        update_tracers(world, dt);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn tick_message(slot: &mut Option<TimedMessage>, dt: f32) {
    if let Some(message) = slot {
        message.time_remaining -= dt;
        if message.time_remaining <= 0.0 {
            *slot = None;
        }
    }
}

/// Start (or restart) the hit flash on `entity`.
pub fn flash(world: &mut World, entity: Entity) {
    world
        .insert_one(entity, HitFlash { remaining: HIT_FLASH_SECONDS })
        .ok();
}

/// Spawn a tracer travelling from `origin` along `direction`.
pub fn spawn_tracer(world: &mut World, origin: Vec3, direction: Vec3) -> Entity {
    let direction = direction.normalize_or_zero();
    let mut transform = Transform::from_position(origin);
    if direction != Vec3::ZERO {
        transform.rotation = Quat::from_rotation_arc(-Vec3::Z, direction);
    }
    world.spawn((
        transform,
        Velocity::new(direction * TRACER_SPEED),
        Lifetime::new(TRACER_LIFETIME),
        Tracer,
    ))
}

fn update_flashes(world: &mut World, dt: f32) {
    let mut expired = Vec::new();
    for (entity, flash) in world.query_mut::<&mut HitFlash>() {
        flash.remaining -= dt;
        if flash.remaining <= 0.0 {
            expired.push(entity);
        }
    }
    for entity in expired {
        world.remove_one::<HitFlash>(entity).ok();
    }
}

/// Move tracers and purge the expired ones. Tracers never collide.
fn update_tracers(world: &mut World, dt: f32) -> usize {
    let mut expired = Vec::new();
    for (entity, (transform, velocity, lifetime, _)) in
        world.query_mut::<(&mut Transform, &Velocity, &mut Lifetime, &Tracer)>()
    {
        transform.position += velocity.linear * dt;
        if lifetime.update(dt) {
            expired.push(entity);
        }
    }
    for &entity in &expired {
        world.despawn(entity).ok();
    }
    expired.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracers_fly_and_expire() {
        let mut world = World::new();
        let tracer = spawn_tracer(&mut world, Vec3::ZERO, Vec3::new(0.0, 0.0, -2.0));
        let mut effects = Effects::new();

        effects.update(&mut world, 0.5);
        let pos = world.get::<&Transform>(tracer).unwrap().position;
        assert!((pos.z + 40.0).abs() < 1e-3);

        // Past the lifetime the tracer is gone even though it hit nothing.
        for _ in 0..4 {
            effects.update(&mut world, 0.5);
        }
        assert!(!world.contains(tracer));
    }

    #[test]
    fn flash_is_removed_but_entity_survives() {
        let mut world = World::new();
        let target = world.spawn((Transform::default(),));
        flash(&mut world, target);
        assert!(world.get::<&HitFlash>(target).is_ok());

        let mut effects = Effects::new();
        effects.update(&mut world, 0.05);
        assert!(world.get::<&HitFlash>(target).is_ok());
        effects.update(&mut world, 0.06);
        assert!(world.get::<&HitFlash>(target).is_err());
        assert!(world.contains(target));
    }

    #[test]
    fn messages_and_overlay_time_out() {
        let mut world = World::new();
        let mut effects = Effects::new();
        effects.banner("Wave 2: Here they come!");
        effects.toast("+25 health");
        effects.player_damaged();
        assert!(effects.damage_overlay_active());

        effects.update(&mut world, 0.6);
        assert!(!effects.damage_overlay_active());
        assert_eq!(effects.wave_message(), "Wave 2: Here they come!");

        effects.update(&mut world, 3.5);
        assert_eq!(effects.wave_message(), "");
        assert_eq!(effects.player_message(), "");
    }
}

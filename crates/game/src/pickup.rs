//! Supply crates dropped by rare zombies.

use engine_core::{Lifetime, Transform, Vec3};
use hecs::{Entity, World};
use rand::Rng;

/// Crates despawn if nobody picks them up in time.
pub const PICKUP_LIFETIME: f32 = 30.0;
/// Flat distance at which the player collects a crate.
pub const PICKUP_RADIUS: f32 = 1.5;
pub const HEALTH_CRATE_AMOUNT: f32 = 25.0;
pub const AMMO_CRATE_ROUNDS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickupKind {
    Health(f32),
    Ammo(u32),
}

impl PickupKind {
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen_bool(0.5) {
            PickupKind::Health(HEALTH_CRATE_AMOUNT)
        } else {
            PickupKind::Ammo(AMMO_CRATE_ROUNDS)
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PickupKind::Health(amount) => format!("+{:.0} health", amount),
            PickupKind::Ammo(rounds) => format!("+{} rounds", rounds),
        }
    }
}

/// Pickup component.
#[derive(Debug, Clone, Copy)]
pub struct Pickup {
    pub kind: PickupKind,
}

/// Drop a crate on the floor below `position`.
pub fn spawn_pickup(world: &mut World, position: Vec3, kind: PickupKind) -> Entity {
    let floor = Vec3::new(position.x, 0.5, position.z);
    world.spawn((
        Transform::from_position(floor),
        Pickup { kind },
        Lifetime::new(PICKUP_LIFETIME),
    ))
}

/// Age crates and take the ones within reach of `player_position`.
/// Collected and expired crates are despawned.
pub fn update_pickups(world: &mut World, player_position: Vec3, dt: f32) -> Vec<PickupKind> {
    let mut collected = Vec::new();
    let mut remove = Vec::new();

    for (entity, (transform, pickup, lifetime)) in
        world.query_mut::<(&Transform, &Pickup, &mut Lifetime)>()
    {
        let flat = Vec3::new(
            transform.position.x - player_position.x,
            0.0,
            transform.position.z - player_position.z,
        );
        if flat.length() <= PICKUP_RADIUS {
            collected.push(pickup.kind);
            remove.push(entity);
        } else if lifetime.update(dt) {
            remove.push(entity);
        }
    }

    for entity in remove {
        world.despawn(entity).ok();
    }
    collected
}

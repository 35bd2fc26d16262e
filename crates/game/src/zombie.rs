//! Zombie actor components.

use engine_core::{AIState, Health, Transform, Vec3};
use physics::Aabb;
use procgen::{ZombieDescriptor, ZombieKind};

/// Zombie component. Lives on an entity next to its `Transform` and `Health`.
#[derive(Debug, Clone)]
pub struct Zombie {
    pub kind: ZombieKind,
    /// Units per 1/60 s reference frame.
    pub speed: f32,
    /// Cleared exactly once, when health first reaches zero.
    pub alive: bool,
    pub ai_state: AIState,
}

/// What a hit did to a zombie.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Target was already dead; nothing changed.
    Ignored,
    Wounded { remaining: f32 },
    Killed,
}

impl Zombie {
    pub fn from_descriptor(descriptor: &ZombieDescriptor) -> Self {
        Self {
            kind: descriptor.kind,
            speed: descriptor.speed,
            alive: true,
            ai_state: AIState::Chasing,
        }
    }

    /// Apply `amount` damage. A dead zombie ignores further hits, so a kill
    /// is reported at most once per zombie.
    pub fn apply_damage(&mut self, health: &mut Health, amount: f32) -> DamageOutcome {
        if !self.alive {
            return DamageOutcome::Ignored;
        }
        health.take_damage(amount);
        if health.is_dead() {
            self.alive = false;
            self.ai_state = AIState::Dead;
            DamageOutcome::Killed
        } else {
            DamageOutcome::Wounded {
                remaining: health.current,
            }
        }
    }

    /// World-space box for a zombie whose transform sits at the box centre.
    pub fn aabb(&self, transform: &Transform) -> Aabb {
        Aabb::from_center_half_extents(transform.position, self.kind.half_extents())
    }
}

/// Bundle of components for spawning a zombie.
pub struct ZombieBundle {
    pub transform: Transform,
    pub health: Health,
    pub zombie: Zombie,
}

impl ZombieBundle {
    /// `floor_position` is the point on the floor the zombie stands on.
    pub fn new(descriptor: &ZombieDescriptor, floor_position: Vec3) -> Self {
        let half = descriptor.kind.half_extents();
        Self {
            transform: Transform::from_position(Vec3::new(floor_position.x, half.y, floor_position.z)),
            health: Health::new(descriptor.health),
            zombie: Zombie::from_descriptor(descriptor),
        }
    }

    /// Spawn into the ECS world.
    pub fn spawn(self, world: &mut hecs::World) -> hecs::Entity {
        world.spawn((self.transform, self.health, self.zombie))
    }
}

/// Number of zombies still alive.
pub fn count_alive(world: &hecs::World) -> usize {
    world
        .query::<&Zombie>()
        .iter()
        .filter(|(_, z)| z.alive)
        .count()
}

//! Horde AI: every live zombie turns toward the player and shuffles forward
//! until it is close enough to bite.

use engine_core::{AIState, Transform, Vec3};
use hecs::{Entity, World};
use physics::{resolve_motion, Aabb, CollisionPolicy};
use procgen::ZombieKind;

use crate::player::{PlayerController, REFERENCE_FPS};
use crate::zombie::Zombie;

/// Centre-to-centre distance at which a zombie stops and attacks.
pub const MELEE_RANGE: f32 = 1.5;

/// A bite that landed this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactHit {
    pub entity: Entity,
    pub kind: ZombieKind,
    pub damage: f32,
}

/// Manages AI behavior for the zombie horde.
#[derive(Debug, Clone, Copy)]
pub struct HordeAI {
    pub melee_range: f32,
}

impl Default for HordeAI {
    fn default() -> Self {
        Self {
            melee_range: MELEE_RANGE,
        }
    }
}

impl HordeAI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update all zombies in the horde. Returns the contact hit dealt to the
    /// player, if any; the player's shared contact cooldown allows at most
    /// one per interval.
    pub fn update(
        &self,
        world: &mut World,
        player: &mut PlayerController,
        obstacles: &[Aabb],
        dt: f32,
    ) -> Option<ContactHit> {
        let target = player.position;
        let mut hit = None;

        for (entity, (transform, zombie)) in world.query_mut::<(&mut Transform, &mut Zombie)>() {
            if !zombie.alive {
                continue;
            }

            transform.face_towards_flat(target);
            let flat = Vec3::new(target.x - transform.position.x, 0.0, target.z - transform.position.z);
            // Steps stay on the floor but reach is measured in 3D, so a
            // player on top of a crate is out of biting range.
            let distance = transform.position.distance(target);

            if distance > self.melee_range {
                zombie.ai_state = AIState::Chasing;
                let step = flat.normalize_or_zero() * zombie.speed * dt * REFERENCE_FPS;
                let outcome = resolve_motion(
                    transform.position,
                    zombie.kind.half_extents(),
                    step,
                    obstacles,
                    CollisionPolicy::Revert,
                );
                transform.position = outcome.position;
            } else {
                zombie.ai_state = AIState::Attacking;
                if hit.is_none() && player.contact.is_ready() && !player.is_dead() {
                    let damage = zombie.kind.melee_damage();
                    player.take_damage(damage);
                    player.contact.trigger();
                    hit = Some(ContactHit {
                        entity,
                        kind: zombie.kind,
                        damage,
                    });
                }
            }
        }

        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zombie::ZombieBundle;
    use procgen::ZombieDescriptor;

    const DT: f32 = 1.0 / 60.0;

    fn spawn(world: &mut World, kind: ZombieKind, x: f32, z: f32) -> Entity {
        let descriptor = ZombieDescriptor { kind, health: 30.0, speed: 0.03 };
        ZombieBundle::new(&descriptor, Vec3::new(x, 0.0, z)).spawn(world)
    }

    fn player() -> PlayerController {
        PlayerController::new(PlayerController::spawn_point())
    }

    #[test]
    fn zombies_close_in_on_the_player() {
        let mut world = World::new();
        let z = spawn(&mut world, ZombieKind::Walker, 10.0, 0.0);
        let mut p = player();
        let ai = HordeAI::new();

        for _ in 0..60 {
            ai.update(&mut world, &mut p, &[], DT);
        }
        let t = world.get::<&Transform>(z).unwrap();
        // 0.03 per reference frame for one second.
        assert!((t.position.x - 8.2).abs() < 1e-3, "x = {}", t.position.x);
        assert!(t.forward().x < -0.99);
    }

    #[test]
    fn blocked_steps_are_reverted() {
        let mut world = World::new();
        let z = spawn(&mut world, ZombieKind::Walker, 3.0, 0.0);
        // Touching the zombie's -X face, so any step toward the player overlaps.
        let wall = Aabb::new(Vec3::new(1.5, 0.0, -2.0), Vec3::new(2.5, 3.0, 2.0));
        let mut p = player();

        HordeAI::new().update(&mut world, &mut p, &[wall], DT);
        assert_eq!(world.get::<&Transform>(z).unwrap().position.x, 3.0);
    }

    #[test]
    fn contact_damage_respects_cooldown() {
        let mut world = World::new();
        spawn(&mut world, ZombieKind::Walker, 1.0, 0.0);
        spawn(&mut world, ZombieKind::Brute, -1.0, 0.0);
        let mut p = player();
        let ai = HordeAI::new();

        let first = ai.update(&mut world, &mut p, &[], DT);
        assert!(first.is_some());
        let after_first = p.health.current;
        assert!(after_first == 90.0 || after_first == 85.0);

        // Both zombies are in range but the cooldown holds for a second.
        for _ in 0..30 {
            p.contact.update(DT);
            assert!(ai.update(&mut world, &mut p, &[], DT).is_none());
        }
        assert_eq!(p.health.current, after_first);

        for _ in 0..31 {
            p.contact.update(DT);
        }
        assert!(ai.update(&mut world, &mut p, &[], DT).is_some());
    }

    #[test]
    fn zombie_spawned_inside_a_crate_walks_out() {
        let mut world = World::new();
        let z = spawn(&mut world, ZombieKind::Walker, 0.0, -10.0);
        let crate_box = Aabb::from_center_half_extents(Vec3::new(0.0, 1.5, -10.0), Vec3::splat(1.5));
        let mut p = player();
        let ai = HordeAI::new();

        for _ in 0..120 {
            ai.update(&mut world, &mut p, &[crate_box], DT);
        }
        let t = world.get::<&Transform>(z).unwrap();
        assert!(t.position.z > -7.0, "z = {}", t.position.z);
    }

    #[test]
    fn player_on_a_crate_is_out_of_reach() {
        let mut world = World::new();
        let z = spawn(&mut world, ZombieKind::Walker, 2.6, 0.0);
        let crate_box = Aabb::new(Vec3::new(0.0, 0.0, -2.0), Vec3::new(2.0, 4.0, 2.0));
        let mut p = player();
        p.position = Vec3::new(1.9, 5.0, 0.0);
        let ai = HordeAI::new();

        for _ in 0..120 {
            p.contact.update(DT);
            assert!(ai.update(&mut world, &mut p, &[crate_box], DT).is_none());
        }
        assert_eq!(p.health.current, 100.0);
        assert_eq!(world.get::<&Zombie>(z).unwrap().ai_state, AIState::Chasing);
    }

    #[test]
    fn dead_zombies_stay_put() {
        let mut world = World::new();
        let z = spawn(&mut world, ZombieKind::Walker, 1.0, 0.0);
        world.get::<&mut Zombie>(z).unwrap().alive = false;
        let mut p = player();

        assert!(HordeAI::new().update(&mut world, &mut p, &[], DT).is_none());
        assert_eq!(p.health.current, 100.0);
    }
}

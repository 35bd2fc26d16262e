//! Wave spawning: turns zombie descriptors into positioned actors.
//!
//! Every zombie gets a uniformly random spot on the floor. Spots whose box
//! would overlap an obstacle, or that sit on top of the player, are rolled
//! again; after the attempt budget runs out the last roll is used anyway so
//! a crowded arena never loses zombies.

use engine_core::Vec3;
use hecs::{Entity, World};
use physics::{overlaps_any, Aabb};
use procgen::{Arena, ZombieDescriptor};
use rand::prelude::*;

use crate::zombie::{Zombie, ZombieBundle};

/// Spawn placement tuning.
#[derive(Debug, Clone, Copy)]
pub struct SpawnSettings {
    /// Distance kept from the walls.
    pub margin: f32,
    /// Minimum distance from the player at spawn time.
    pub min_player_distance: f32,
    /// Rolls per zombie before the last roll is accepted.
    pub max_attempts: usize,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            margin: 1.0,
            min_player_distance: 8.0,
            max_attempts: 50,
        }
    }
}

/// What a call to [`ZombieSpawner::spawn_wave`] produced.
#[derive(Debug, Default)]
pub struct SpawnReport {
    pub spawned: Vec<Entity>,
    /// Zombies placed at their last roll after the attempt budget ran out.
    pub exhausted: usize,
}

/// Places zombie waves into the world.
pub struct ZombieSpawner {
    pub settings: SpawnSettings,
    rng: StdRng,
}

impl ZombieSpawner {
    pub fn new(settings: SpawnSettings, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { settings, rng }
    }

    /// Despawn every zombie entity, dead or alive.
    pub fn clear(world: &mut World) -> usize {
        let zombies: Vec<Entity> = world.query::<&Zombie>().iter().map(|(e, _)| e).collect();
        for &entity in &zombies {
            world.despawn(entity).ok();
        }
        zombies.len()
    }

    /// Replace the current zombies with one actor per descriptor.
    pub fn spawn_wave(
        &mut self,
        world: &mut World,
        descriptors: &[ZombieDescriptor],
        arena: &Arena,
        player_position: Vec3,
    ) -> SpawnReport {
        let removed = Self::clear(world);
        if removed > 0 {
            log::debug!("Cleared {} zombies from the previous wave", removed);
        }

        let mut report = SpawnReport::default();
        for descriptor in descriptors {
            let (spot, clean) = self.find_spot(descriptor, arena, player_position);
            if !clean {
                report.exhausted += 1;
            }
            report.spawned.push(ZombieBundle::new(descriptor, spot).spawn(world));
        }

        if report.exhausted > 0 {
            log::warn!(
                "{} of {} zombies placed without a clear spot",
                report.exhausted,
                descriptors.len()
            );
        }
        report
    }

    /// Roll a floor point for `descriptor`. The flag is false when the
    /// attempt budget ran out and the point may overlap an obstacle.
    fn find_spot(&mut self, descriptor: &ZombieDescriptor, arena: &Arena, player: Vec3) -> (Vec3, bool) {
        let half = descriptor.kind.half_extents();
        let margin = self.settings.margin.max(half.x.max(half.z));
        let min_dist_sq = self.settings.min_player_distance * self.settings.min_player_distance;

        let mut last = Vec3::ZERO;
        for _ in 0..self.settings.max_attempts.max(1) {
            let spot = arena.random_floor_point(margin, &mut self.rng);
            last = spot;

            let flat = Vec3::new(spot.x - player.x, 0.0, spot.z - player.z);
            if flat.length_squared() < min_dist_sq {
                continue;
            }
            let aabb = Aabb::from_center_half_extents(Vec3::new(spot.x, half.y, spot.z), half);
            if !overlaps_any(&aabb, arena.colliders()) {
                return (spot, true);
            }
        }
        (last, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{Health, Transform};
    use procgen::{generate_arena, ArenaConfig, Obstacle, ObstacleShape, ZombieKind};

    fn roster() -> Vec<ZombieDescriptor> {
        vec![
            ZombieDescriptor { kind: ZombieKind::Walker, health: 31.0, speed: 0.031 },
            ZombieDescriptor { kind: ZombieKind::Runner, health: 21.0, speed: 0.052 },
            ZombieDescriptor { kind: ZombieKind::Brute, health: 85.0, speed: 0.021 },
        ]
    }

    #[test]
    fn spawns_one_matching_actor_per_descriptor() {
        let mut rng = StdRng::seed_from_u64(3);
        let arena = generate_arena(&ArenaConfig::default(), &mut rng);
        let mut world = World::new();
        let mut spawner = ZombieSpawner::new(SpawnSettings::default(), Some(9));

        let descriptors = roster();
        let report = spawner.spawn_wave(&mut world, &descriptors, &arena, Vec3::ZERO);
        assert_eq!(report.spawned.len(), descriptors.len());
        assert_eq!(report.exhausted, 0);

        for (entity, descriptor) in report.spawned.iter().zip(&descriptors) {
            let zombie = world.get::<&Zombie>(*entity).unwrap();
            let health = world.get::<&Health>(*entity).unwrap();
            let transform = world.get::<&Transform>(*entity).unwrap();
            assert_eq!(zombie.kind, descriptor.kind);
            assert_eq!(zombie.speed, descriptor.speed);
            assert_eq!(health.current, descriptor.health);
            assert!(zombie.alive);
            assert!(!overlaps_any(&zombie.aabb(&transform), arena.colliders()));
            assert!(transform.position.distance(Vec3::new(0.0, transform.position.y, 0.0)) >= 8.0);
        }
    }

    #[test]
    fn previous_wave_is_cleared_first() {
        let arena = Arena::open(60.0);
        let mut world = World::new();
        let mut spawner = ZombieSpawner::new(SpawnSettings::default(), Some(1));
        spawner.spawn_wave(&mut world, &roster(), &arena, Vec3::ZERO);
        spawner.spawn_wave(&mut world, &roster()[..1], &arena, Vec3::ZERO);
        assert_eq!(world.query::<&Zombie>().iter().count(), 1);
    }

    #[test]
    fn exhausted_spots_still_spawn() {
        // One box covering the whole floor leaves no clean spot anywhere.
        let blanket = Obstacle {
            shape: ObstacleShape::Box,
            aabb: Aabb::new(Vec3::new(-20.0, 0.0, -20.0), Vec3::new(20.0, 3.0, 20.0)),
        };
        let arena = Arena::new(40.0, 5.0, 1.0, vec![blanket]);
        let mut world = World::new();
        let mut spawner = ZombieSpawner::new(SpawnSettings::default(), Some(4));

        let report = spawner.spawn_wave(&mut world, &roster(), &arena, Vec3::ZERO);
        assert_eq!(report.spawned.len(), 3);
        assert_eq!(report.exhausted, 3);
        assert_eq!(crate::zombie::count_alive(&world), 3);
    }
}

//! Walled square arena with randomly scattered obstacles.

use engine_core::Vec3;
use physics::Aabb;
use rand::prelude::*;

/// Attempts per obstacle before giving up on keeping the spawn area clear.
const PLACEMENT_ATTEMPTS: usize = 32;

/// Render hint for an obstacle. Collision only ever uses the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObstacleShape {
    Wall,
    Box,
    Sphere,
    Cone,
    Cylinder,
}

impl ObstacleShape {
    /// Extents of the bounding box and the height of its centre above the floor.
    fn footprint(&self) -> (Vec3, f32) {
        match self {
            // Radius-2 sphere resting half sunk in the floor.
            ObstacleShape::Sphere => (Vec3::splat(4.0), 1.5),
            ObstacleShape::Cone => (Vec3::new(4.0, 4.0, 4.0), 2.0),
            ObstacleShape::Cylinder => (Vec3::new(3.0, 3.0, 3.0), 1.5),
            ObstacleShape::Box | ObstacleShape::Wall => (Vec3::splat(3.0), 1.5),
        }
    }
}

/// A static piece of level geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub shape: ObstacleShape,
    pub aabb: Aabb,
}

/// Layout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArenaConfig {
    /// Side length of the square floor.
    pub size: f32,
    pub wall_height: f32,
    pub wall_thickness: f32,
    pub obstacle_count: usize,
    /// Obstacles keep their boxes at least this far from the centre so the
    /// player never starts inside one.
    pub clear_radius: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            size: 100.0,
            wall_height: 5.0,
            wall_thickness: 1.0,
            obstacle_count: 8,
            clear_radius: 6.0,
        }
    }
}

/// The play area: floor at y = 0 enclosed by four walls.
#[derive(Debug, Clone)]
pub struct Arena {
    pub size: f32,
    pub wall_thickness: f32,
    pub obstacles: Vec<Obstacle>,
    colliders: Vec<Aabb>,
}

impl Arena {
    /// Build an arena from explicit obstacles. Walls are added automatically.
    pub fn new(size: f32, wall_height: f32, wall_thickness: f32, extra: Vec<Obstacle>) -> Self {
        let half = size * 0.5;
        let t = wall_thickness * 0.5;
        let h = wall_height;
        let walls = [
            Aabb::new(Vec3::new(-half, 0.0, -half - t), Vec3::new(half, h, -half + t)),
            Aabb::new(Vec3::new(-half, 0.0, half - t), Vec3::new(half, h, half + t)),
            Aabb::new(Vec3::new(-half - t, 0.0, -half), Vec3::new(-half + t, h, half)),
            Aabb::new(Vec3::new(half - t, 0.0, -half), Vec3::new(half + t, h, half)),
        ];

        let mut obstacles: Vec<Obstacle> = walls
            .into_iter()
            .map(|aabb| Obstacle { shape: ObstacleShape::Wall, aabb })
            .collect();
        obstacles.extend(extra);
        let colliders = obstacles.iter().map(|o| o.aabb).collect();

        Self {
            size,
            wall_thickness,
            obstacles,
            colliders,
        }
    }

    /// An empty walled arena.
    pub fn open(size: f32) -> Self {
        let defaults = ArenaConfig::default();
        Self::new(size, defaults.wall_height, defaults.wall_thickness, Vec::new())
    }

    /// Collision boxes of every obstacle, walls included.
    pub fn colliders(&self) -> &[Aabb] {
        &self.colliders
    }

    /// Half extent of the walkable floor (up to the inner wall faces).
    pub fn interior_half(&self) -> f32 {
        self.size * 0.5 - self.wall_thickness * 0.5
    }

    /// Clamp a position's XZ so a body of `radius` stays inside the walls.
    pub fn clamp_inside(&self, position: Vec3, radius: f32) -> Vec3 {
        let limit = (self.interior_half() - radius).max(0.0);
        Vec3::new(
            position.x.clamp(-limit, limit),
            position.y,
            position.z.clamp(-limit, limit),
        )
    }

    /// Uniform random XZ point inside the walls, `margin` away from them.
    pub fn random_floor_point<R: Rng + ?Sized>(&self, margin: f32, rng: &mut R) -> Vec3 {
        let limit = (self.interior_half() - margin).max(0.0);
        if limit <= 0.0 {
            return Vec3::ZERO;
        }
        Vec3::new(rng.gen_range(-limit..limit), 0.0, rng.gen_range(-limit..limit))
    }
}

/// Scatter `config.obstacle_count` obstacles over the floor.
pub fn generate_arena<R: Rng + ?Sized>(config: &ArenaConfig, rng: &mut R) -> Arena {
    const SHAPES: [ObstacleShape; 4] = [
        ObstacleShape::Sphere,
        ObstacleShape::Cone,
        ObstacleShape::Cylinder,
        ObstacleShape::Box,
    ];

    let spread = ((config.size - 10.0) * 0.5).max(0.0);
    let mut placed = Vec::with_capacity(config.obstacle_count);

    for _ in 0..config.obstacle_count {
        let shape = SHAPES[rng.gen_range(0..SHAPES.len())];
        let (extents, centre_y) = shape.footprint();
        let half = extents * 0.5;

        let mut chosen = None;
        for _ in 0..PLACEMENT_ATTEMPTS {
            let x = if spread > 0.0 { rng.gen_range(-spread..spread) } else { 0.0 };
            let z = if spread > 0.0 { rng.gen_range(-spread..spread) } else { 0.0 };
            let aabb = Aabb::from_center_half_extents(Vec3::new(x, centre_y, z), half);
            if keeps_centre_clear(&aabb, config.clear_radius) {
                chosen = Some(aabb);
                break;
            }
        }

        match chosen {
            Some(aabb) => placed.push(Obstacle { shape, aabb }),
            None => log::debug!("Dropped a {:?} obstacle: no room outside the spawn area", shape),
        }
    }

    let mut arena = Arena::new(config.size, config.wall_height, config.wall_thickness, placed);
    // Sunk spheres poke below the floor; trim them so nothing reaches under y = 0.
    for (obstacle, collider) in arena.obstacles.iter_mut().zip(arena.colliders.iter_mut()) {
        obstacle.aabb.min.y = obstacle.aabb.min.y.max(0.0);
        collider.min.y = obstacle.aabb.min.y;
    }
    arena
}

/// True if the XZ footprint of `aabb` stays outside the circle of `radius`.
fn keeps_centre_clear(aabb: &Aabb, radius: f32) -> bool {
    let nearest_x = 0.0_f32.clamp(aabb.min.x, aabb.max.x);
    let nearest_z = 0.0_f32.clamp(aabb.min.z, aabb.max.z);
    nearest_x * nearest_x + nearest_z * nearest_z >= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn arena_has_walls_and_requested_obstacles() {
        let mut rng = StdRng::seed_from_u64(5);
        let arena = generate_arena(&ArenaConfig::default(), &mut rng);
        let walls = arena.obstacles.iter().filter(|o| o.shape == ObstacleShape::Wall).count();
        assert_eq!(walls, 4);
        assert_eq!(arena.obstacles.len(), 12);
        assert_eq!(arena.colliders().len(), arena.obstacles.len());
    }

    #[test]
    fn spawn_area_stays_clear() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let arena = generate_arena(&ArenaConfig::default(), &mut rng);
            let player = Aabb::from_center_half_extents(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.5, 1.0, 0.5));
            assert!(!physics::overlaps_any(&player, arena.colliders()), "seed {seed}");
            assert!(arena.colliders().iter().all(|c| c.min.y >= 0.0));
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let a = generate_arena(&ArenaConfig::default(), &mut StdRng::seed_from_u64(77));
        let b = generate_arena(&ArenaConfig::default(), &mut StdRng::seed_from_u64(77));
        assert_eq!(a.obstacles, b.obstacles);
    }

    #[test]
    fn clamp_keeps_bodies_off_the_walls() {
        let arena = Arena::open(100.0);
        let p = arena.clamp_inside(Vec3::new(80.0, 1.0, -80.0), 0.5);
        assert_eq!(p, Vec3::new(49.0, 1.0, -49.0));
        let body = Aabb::from_center_half_extents(p, Vec3::new(0.5, 1.0, 0.5));
        assert!(!physics::overlaps_any(&body, arena.colliders()));
    }
}

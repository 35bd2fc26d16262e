//! Player controller and state.

use std::f32::consts::FRAC_PI_2;

use engine_core::{view_direction, Cooldown, Health, Quat, Vec3};
use input::Controls;
use physics::{resolve_motion, Aabb, CollisionPolicy};
use procgen::Arena;

use crate::weapons::Loadout;

/// Half extents of the player's collision box.
pub const PLAYER_HALF_EXTENTS: Vec3 = Vec3::new(0.5, 1.0, 0.5);
/// Camera height above the centre of the collision box.
pub const EYE_OFFSET: f32 = 0.6;
/// Seconds between two contact hits from zombies.
pub const CONTACT_COOLDOWN: f32 = 1.0;
/// Largest single collision step. Longer moves are split so fast frames
/// cannot tunnel through thin walls.
const MAX_STEP: f32 = 0.25;
/// Friction and zombie speeds are expressed per 1/60 s frame.
pub const REFERENCE_FPS: f32 = 60.0;

/// Movement and look constants.
#[derive(Debug, Clone, Copy)]
pub struct MovementTuning {
    pub move_speed: f32,
    pub sprint_multiplier: f32,
    /// Fraction of the ground speed available while airborne.
    pub air_control: f32,
    /// Horizontal velocity kept per reference frame with no input held.
    pub friction: f32,
    pub gravity: f32,
    pub jump_force: f32,
    /// Radians per pointer pixel.
    pub pointer_sensitivity: f32,
    /// Radians per second while a look key is held.
    pub look_key_speed: f32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            sprint_multiplier: 1.5,
            air_control: 0.3,
            friction: 0.9,
            gravity: 20.0,
            jump_force: 8.0,
            pointer_sensitivity: 0.002,
            look_key_speed: 1.5,
        }
    }
}

impl MovementTuning {
    /// Defaults with the pointer sensitivity scaled by a user multiplier.
    pub fn with_sensitivity(multiplier: f32) -> Self {
        let defaults = Self::default();
        Self {
            pointer_sensitivity: defaults.pointer_sensitivity * multiplier,
            ..defaults
        }
    }
}

/// Player controller handling movement, look and health.
pub struct PlayerController {
    /// Centre of the collision box.
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub velocity: Vec3,
    pub grounded: bool,
    pub health: Health,
    /// Shared by every zombie: the player takes at most one contact hit per interval.
    pub contact: Cooldown,
    pub loadout: Loadout,
}

impl PlayerController {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            velocity: Vec3::ZERO,
            grounded: true,
            health: Health::new(100.0),
            contact: Cooldown::new(CONTACT_COOLDOWN),
            loadout: Loadout::new(),
        }
    }

    /// Standing at the arena centre.
    pub fn spawn_point() -> Vec3 {
        Vec3::new(0.0, PLAYER_HALF_EXTENTS.y, 0.0)
    }

    /// Update player state based on input.
    pub fn update(&mut self, dt: f32, controls: &Controls, arena: &Arena, tuning: &MovementTuning) {
        self.update_look(dt, controls, tuning);
        self.update_velocity(dt, controls, tuning);
        self.integrate(dt, arena.colliders());
        self.position = arena.clamp_inside(self.position, PLAYER_HALF_EXTENTS.x);
        self.contact.update(dt);
    }

    fn update_look(&mut self, dt: f32, controls: &Controls, tuning: &MovementTuning) {
        if controls.pointer_captured {
            self.yaw -= controls.look_delta.x * tuning.pointer_sensitivity;
            self.pitch -= controls.look_delta.y * tuning.pointer_sensitivity;
        }

        let step = tuning.look_key_speed * dt;
        let keys = controls.look_keys;
        if keys.left {
            self.yaw += step;
        }
        if keys.right {
            self.yaw -= step;
        }
        if keys.up {
            self.pitch += step;
        }
        if keys.down {
            self.pitch -= step;
        }

        self.pitch = self.pitch.clamp(-FRAC_PI_2, FRAC_PI_2);
        self.yaw = self.yaw.rem_euclid(std::f32::consts::TAU);
    }

    fn update_velocity(&mut self, dt: f32, controls: &Controls, tuning: &MovementTuning) {
        let axes = controls.movement_axes();
        if axes.length_squared() > 0.0 {
            // Forward input is -Z in local space.
            let local = Vec3::new(axes.x, 0.0, -axes.y).normalize();
            let wish = Quat::from_rotation_y(self.yaw) * local;

            let mut speed = tuning.move_speed;
            if controls.sprint {
                speed *= tuning.sprint_multiplier;
            }
            if !self.grounded {
                speed *= tuning.air_control;
            }
            self.velocity.x = wish.x * speed;
            self.velocity.z = wish.z * speed;
        } else {
            let keep = tuning.friction.powf(dt * REFERENCE_FPS);
            self.velocity.x *= keep;
            self.velocity.z *= keep;
        }

        if self.grounded && controls.jump {
            self.velocity.y = tuning.jump_force;
            self.grounded = false;
        }
        self.velocity.y -= tuning.gravity * dt;
    }

    fn integrate(&mut self, dt: f32, colliders: &[Aabb]) {
        let mut delta = self.velocity * dt;
        // Never sink below the floor.
        let floor_gap = self.position.y - PLAYER_HALF_EXTENTS.y;
        delta.y = delta.y.max(-floor_gap.max(0.0));

        let steps = (delta.abs().max_element() / MAX_STEP).ceil().max(1.0) as usize;
        let step = delta / steps as f32;

        let mut landed = false;
        let mut blocked_y = false;
        for _ in 0..steps {
            let outcome = resolve_motion(
                self.position,
                PLAYER_HALF_EXTENTS,
                step,
                colliders,
                CollisionPolicy::SlideOnAxis,
            );
            self.position = outcome.position;
            if outcome.blocked.x {
                self.velocity.x = 0.0;
            }
            if outcome.blocked.z {
                self.velocity.z = 0.0;
            }
            landed |= outcome.landed;
            blocked_y |= outcome.blocked.y;
        }

        let on_floor = self.position.y - PLAYER_HALF_EXTENTS.y <= 1e-4;
        if on_floor {
            self.position.y = PLAYER_HALF_EXTENTS.y;
        }
        self.grounded = on_floor || landed;
        if blocked_y || (self.grounded && self.velocity.y < 0.0) {
            self.velocity.y = 0.0;
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        self.position + Vec3::new(0.0, EYE_OFFSET, 0.0)
    }

    pub fn view_direction(&self) -> Vec3 {
        view_direction(self.yaw, self.pitch)
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_half_extents(self.position, PLAYER_HALF_EXTENTS)
    }

    /// Take damage. Returns the amount actually applied.
    pub fn take_damage(&mut self, amount: f32) -> f32 {
        self.health.take_damage(amount)
    }

    /// Check if player is dead.
    pub fn is_dead(&self) -> bool {
        self.health.is_dead()
    }

    /// Heal the player.
    pub fn heal(&mut self, amount: f32) {
        self.health.heal(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use physics::overlaps_any;
    use procgen::{generate_arena, ArenaConfig, Obstacle, ObstacleShape};
    use rand::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn forward() -> Controls {
        Controls {
            forward: true,
            ..Default::default()
        }
    }

    #[test]
    fn forward_walks_along_negative_z() {
        let arena = Arena::open(100.0);
        let mut player = PlayerController::new(PlayerController::spawn_point());
        for _ in 0..60 {
            player.update(DT, &forward(), &arena, &MovementTuning::default());
        }
        assert!((player.position.z + 5.0).abs() < 0.1, "z = {}", player.position.z);
        assert!(player.position.x.abs() < 1e-4);
        assert!(player.grounded);
    }

    #[test]
    fn sprint_is_faster_and_friction_stops() {
        let arena = Arena::open(100.0);
        let tuning = MovementTuning::default();
        let mut walker = PlayerController::new(PlayerController::spawn_point());
        let mut sprinter = PlayerController::new(PlayerController::spawn_point());
        let sprint = Controls { sprint: true, ..forward() };
        for _ in 0..30 {
            walker.update(DT, &forward(), &arena, &tuning);
            sprinter.update(DT, &sprint, &arena, &tuning);
        }
        assert!(sprinter.position.z < walker.position.z * 1.4);

        for _ in 0..120 {
            walker.update(DT, &Controls::default(), &arena, &tuning);
        }
        assert!(walker.velocity.length() < 0.01);
    }

    #[test]
    fn jump_needs_ground() {
        let arena = Arena::open(100.0);
        let tuning = MovementTuning::default();
        let mut player = PlayerController::new(PlayerController::spawn_point());
        let jump = Controls { jump: true, ..Default::default() };

        player.update(DT, &jump, &arena, &tuning);
        assert!(!player.grounded);
        let rising = player.velocity.y;
        assert!(rising > 0.0);

        // A second press mid-air does nothing.
        player.update(DT, &jump, &arena, &tuning);
        assert!(player.velocity.y < rising);

        for _ in 0..120 {
            player.update(DT, &Controls::default(), &arena, &tuning);
        }
        assert!(player.grounded);
        assert_eq!(player.position.y, PLAYER_HALF_EXTENTS.y);
    }

    #[test]
    fn lands_on_top_of_a_crate() {
        let crate_box = Obstacle {
            shape: ObstacleShape::Box,
            aabb: Aabb::new(Vec3::new(-1.5, 0.0, -1.5), Vec3::new(1.5, 1.0, 1.5)),
        };
        let arena = Arena::new(40.0, 5.0, 1.0, vec![crate_box]);
        let mut player = PlayerController::new(Vec3::new(0.0, 3.5, 0.0));
        player.grounded = false;
        for _ in 0..90 {
            player.update(DT, &Controls::default(), &arena, &MovementTuning::default());
        }
        assert!(player.grounded);
        assert!((player.position.y - 2.0).abs() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped() {
        let arena = Arena::open(100.0);
        let mut player = PlayerController::new(PlayerController::spawn_point());
        let look = Controls {
            pointer_captured: true,
            look_delta: engine_core::Vec2::new(0.0, -100_000.0),
            ..Default::default()
        };
        player.update(DT, &look, &arena, &MovementTuning::default());
        assert_eq!(player.pitch, FRAC_PI_2);

        // Pointer deltas are ignored when the pointer is not captured.
        let free = Controls { pointer_captured: false, ..look };
        let yaw = player.yaw;
        player.update(DT, &Controls { look_delta: engine_core::Vec2::new(500.0, 0.0), ..free }, &arena, &MovementTuning::default());
        assert_eq!(player.yaw, yaw);
    }

    #[test]
    fn never_ends_a_tick_inside_an_obstacle() {
        let tuning = MovementTuning::default();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let config = ArenaConfig { size: 30.0, obstacle_count: 12, clear_radius: 3.0, ..Default::default() };
            let arena = generate_arena(&config, &mut rng);
            let mut player = PlayerController::new(PlayerController::spawn_point());
            assert!(!overlaps_any(&player.aabb(), arena.colliders()));

            for tick in 0..600 {
                let controls = Controls {
                    forward: rng.gen_bool(0.7),
                    backward: rng.gen_bool(0.1),
                    left: rng.gen_bool(0.3),
                    right: rng.gen_bool(0.3),
                    sprint: rng.gen_bool(0.5),
                    jump: rng.gen_bool(0.05),
                    look_keys: input::LookKeys { left: rng.gen_bool(0.2), ..Default::default() },
                    ..Default::default()
                };
                let dt = if tick % 50 == 0 { 0.25 } else { DT };
                player.update(dt, &controls, &arena, &tuning);
                assert!(
                    !overlaps_any(&player.aabb(), arena.colliders()),
                    "seed {seed} tick {tick}: {:?}",
                    player.position
                );
            }
        }
    }
}

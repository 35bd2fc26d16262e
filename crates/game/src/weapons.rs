//! Weapons, ammunition and hit-scan resolution.

use engine_core::{Cooldown, Health, Transform, Vec3};
use hecs::{Entity, World};
use physics::{first_blocker, raycast_nearest, Aabb, Ray, RaycastHit};

use crate::effects;
use crate::zombie::{DamageOutcome, Zombie};

/// Weapon types available to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeaponKind {
    /// Standard rifle - quick follow-up shots, modest damage.
    Rifle,
    /// Special weapon - slow, one-shots anything short of a brute.
    Cannon,
}

impl WeaponKind {
    pub fn name(&self) -> &'static str {
        match self {
            WeaponKind::Rifle => "Rifle",
            WeaponKind::Cannon => "Cannon",
        }
    }
}

/// Weapon instance with current state.
#[derive(Debug, Clone)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub damage: f32,
    pub reload_time: f32,
    pub magazine_size: u32,
    pub current_ammo: u32,
    pub reserve_ammo: u32,
    pub range: f32,

    // State
    pub fire_cooldown: Cooldown,
    pub reload_timer: f32,
    pub is_reloading: bool,
}

impl Weapon {
    pub fn new(kind: WeaponKind) -> Self {
        // (damage, fire interval, reload time, magazine, reserve, range)
        let (damage, interval, reload_time, magazine_size, reserve, range) = match kind {
            WeaponKind::Rifle => (50.0, 0.2, 1.5, 15, 60, 100.0),
            WeaponKind::Cannon => (150.0, 0.8, 2.5, 4, 12, 60.0),
        };

        Self {
            kind,
            damage,
            reload_time,
            magazine_size,
            current_ammo: magazine_size,
            reserve_ammo: reserve,
            range,
            fire_cooldown: Cooldown::new(interval),
            reload_timer: 0.0,
            is_reloading: false,
        }
    }

    /// Advance timers. Returns true on the tick a reload completes.
    pub fn update(&mut self, dt: f32) -> bool {
        self.fire_cooldown.update(dt);

        if self.is_reloading {
            self.reload_timer -= dt;
            if self.reload_timer <= 0.0 {
                self.finish_reload();
                return true;
            }
        }
        false
    }

    /// Check if weapon can fire.
    pub fn can_fire(&self) -> bool {
        self.fire_cooldown.is_ready() && self.current_ammo > 0 && !self.is_reloading
    }

    /// Fire the weapon, consuming ammo.
    pub fn fire(&mut self) -> bool {
        if !self.can_fire() {
            return false;
        }

        self.current_ammo -= 1;
        self.fire_cooldown.trigger();
        true
    }

    /// Start reloading. Returns false if there is nothing to reload.
    pub fn start_reload(&mut self) -> bool {
        if self.is_reloading || self.reserve_ammo == 0 || self.current_ammo == self.magazine_size {
            return false;
        }

        self.is_reloading = true;
        self.reload_timer = self.reload_time;
        true
    }

    pub fn cancel_reload(&mut self) {
        self.is_reloading = false;
        self.reload_timer = 0.0;
    }

    fn finish_reload(&mut self) {
        let needed = self.magazine_size - self.current_ammo;
        let available = needed.min(self.reserve_ammo);

        self.current_ammo += available;
        self.reserve_ammo -= available;
        self.is_reloading = false;
        self.reload_timer = 0.0;
    }

    pub fn add_reserve(&mut self, rounds: u32) {
        self.reserve_ammo = self.reserve_ammo.saturating_add(rounds);
    }

    /// Get ammo display string.
    pub fn ammo_display(&self) -> String {
        if self.is_reloading {
            format!("RELOADING... {}", self.reserve_ammo)
        } else {
            format!("{} / {}", self.current_ammo, self.reserve_ammo)
        }
    }
}

/// The two weapons the player carries.
#[derive(Debug, Clone)]
pub struct Loadout {
    weapons: [Weapon; 2],
    active: usize,
}

impl Default for Loadout {
    fn default() -> Self {
        Self::new()
    }
}

impl Loadout {
    pub fn new() -> Self {
        Self {
            weapons: [Weapon::new(WeaponKind::Rifle), Weapon::new(WeaponKind::Cannon)],
            active: 0,
        }
    }

    pub fn current(&self) -> &Weapon {
        &self.weapons[self.active]
    }

    pub fn current_mut(&mut self) -> &mut Weapon {
        &mut self.weapons[self.active]
    }

    /// Toggle between the two weapons. A reload in progress is abandoned.
    pub fn switch(&mut self) -> WeaponKind {
        self.current_mut().cancel_reload();
        self.active = 1 - self.active;
        self.current().kind
    }

    /// Advance both weapons' fire cooldowns and the active reload.
    /// Returns the weapon whose reload completed this tick.
    pub fn update(&mut self, dt: f32) -> Option<WeaponKind> {
        let active = self.active;
        let mut finished = None;
        for (i, weapon) in self.weapons.iter_mut().enumerate() {
            if i == active {
                if weapon.update(dt) {
                    finished = Some(weapon.kind);
                }
            } else {
                weapon.fire_cooldown.update(dt);
            }
        }
        finished
    }
}

/// A hit that landed on a zombie.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub target: Entity,
    pub damage: f32,
    pub distance: f32,
    pub point: Vec3,
    pub outcome: DamageOutcome,
}

/// A shot that left the barrel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub weapon: WeaponKind,
    pub hit: Option<DamageEvent>,
}

/// Nearest live zombie along `ray` within `range`, unless an obstacle is closer.
/// Obstacles overlapping the zombie itself do not shield it.
pub fn hitscan(world: &World, ray: &Ray, range: f32, obstacles: &[Aabb]) -> Option<RaycastHit<Entity>> {
    let (hit, target_box) = {
        let mut query = world.query::<(&Transform, &Zombie)>();
        let targets = query
            .iter()
            .filter(|(_, (_, zombie))| zombie.alive)
            .map(|(entity, (transform, zombie))| {
                let aabb = zombie.aabb(transform);
                ((entity, aabb), aabb)
            });
        let hit = raycast_nearest(ray, targets, range)?;
        let (entity, aabb) = hit.target;
        let hit = RaycastHit {
            target: entity,
            distance: hit.distance,
            point: hit.point,
        };
        (hit, aabb)
    };

    let blockers: Vec<Aabb> = obstacles
        .iter()
        .filter(|ob| !ob.intersects(&target_box))
        .copied()
        .collect();
    if first_blocker(ray, &blockers, hit.distance).is_some() {
        return None;
    }
    Some(hit)
}

/// Fire the active weapon from `origin` along `direction`.
///
/// Returns `None` when the weapon is not ready (cooldown, reload or empty
/// magazine). Every shot that fires spawns a tracer whether it hits or not.
pub fn shoot(
    loadout: &mut Loadout,
    origin: Vec3,
    direction: Vec3,
    world: &mut World,
    obstacles: &[Aabb],
) -> Option<Shot> {
    let ray = Ray::new(origin, direction)?;
    let weapon = loadout.current_mut();
    if !weapon.fire() {
        return None;
    }
    let (kind, damage, range) = (weapon.kind, weapon.damage, weapon.range);

    effects::spawn_tracer(world, origin, ray.direction);

    let hit = hitscan(world, &ray, range, obstacles).and_then(|hit| {
        let outcome = {
            let (zombie, health) = world
                .query_one_mut::<(&mut Zombie, &mut Health)>(hit.target)
                .ok()?;
            zombie.apply_damage(health, damage)
        };
        if outcome != DamageOutcome::Ignored {
            effects::flash(world, hit.target);
        }
        Some(DamageEvent {
            target: hit.target,
            damage,
            distance: hit.distance,
            point: hit.point,
            outcome,
        })
    });

    Some(Shot { weapon: kind, hit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zombie::ZombieBundle;
    use procgen::{ZombieDescriptor, ZombieKind};

    fn walker_at(world: &mut World, x: f32, z: f32, health: f32) -> Entity {
        let descriptor = ZombieDescriptor { kind: ZombieKind::Walker, health, speed: 0.03 };
        ZombieBundle::new(&descriptor, Vec3::new(x, 0.0, z)).spawn(world)
    }

    const EYE: Vec3 = Vec3::new(0.0, 1.6, 0.0);
    const AHEAD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

    #[test]
    fn fire_rate_gates_the_second_shot() {
        let mut world = World::new();
        let target = walker_at(&mut world, 0.0, -10.0, 500.0);
        let mut loadout = Loadout::new();

        let first = shoot(&mut loadout, EYE, AHEAD, &mut world, &[]).unwrap();
        assert_eq!(first.hit.map(|h| h.target), Some(target));

        loadout.update(0.05);
        assert!(shoot(&mut loadout, EYE, AHEAD, &mut world, &[]).is_none());

        loadout.update(0.15);
        assert!(shoot(&mut loadout, EYE, AHEAD, &mut world, &[]).is_some());
        assert_eq!(world.get::<&Health>(target).unwrap().current, 400.0);
    }

    #[test]
    fn nearest_zombie_takes_the_hit() {
        let mut world = World::new();
        let far = walker_at(&mut world, 0.0, -20.0, 30.0);
        let near = walker_at(&mut world, 0.0, -5.0, 30.0);
        let mut loadout = Loadout::new();

        let shot = shoot(&mut loadout, EYE, AHEAD, &mut world, &[]).unwrap();
        let hit = shot.hit.unwrap();
        assert_eq!(hit.target, near);
        assert_eq!(hit.outcome, DamageOutcome::Killed);
        assert!(world.get::<&Zombie>(far).unwrap().alive);
        assert!(world.get::<&effects::HitFlash>(near).is_ok());
    }

    #[test]
    fn obstacles_block_the_shot() {
        let mut world = World::new();
        walker_at(&mut world, 0.0, -10.0, 30.0);
        let wall = Aabb::new(Vec3::new(-2.0, 0.0, -6.0), Vec3::new(2.0, 3.0, -5.0));
        let mut loadout = Loadout::new();

        let shot = shoot(&mut loadout, EYE, AHEAD, &mut world, &[wall]).unwrap();
        assert!(shot.hit.is_none());
        // The trace still flies.
        assert_eq!(world.query::<&effects::Tracer>().iter().count(), 1);
    }

    #[test]
    fn crate_around_a_zombie_does_not_shield_it() {
        let mut world = World::new();
        let stuck = walker_at(&mut world, 0.0, -10.0, 30.0);
        let crate_box = Aabb::from_center_half_extents(Vec3::new(0.0, 1.5, -10.0), Vec3::splat(1.5));
        let mut loadout = Loadout::new();

        let shot = shoot(&mut loadout, EYE, AHEAD, &mut world, &[crate_box]).unwrap();
        let hit = shot.hit.unwrap();
        assert_eq!(hit.target, stuck);
        assert_eq!(hit.outcome, DamageOutcome::Killed);
    }

    #[test]
    fn dead_zombies_are_not_targets() {
        let mut world = World::new();
        let first = walker_at(&mut world, 0.0, -5.0, 30.0);
        let second = walker_at(&mut world, 0.0, -9.0, 30.0);
        let mut loadout = Loadout::new();

        shoot(&mut loadout, EYE, AHEAD, &mut world, &[]);
        loadout.update(0.2);
        let shot = shoot(&mut loadout, EYE, AHEAD, &mut world, &[]).unwrap();
        assert_eq!(shot.hit.unwrap().target, second);
        assert!(!world.get::<&Zombie>(first).unwrap().alive);
    }

    #[test]
    fn out_of_range_misses() {
        let mut world = World::new();
        walker_at(&mut world, 0.0, -80.0, 30.0);
        let mut loadout = Loadout::new();
        loadout.switch();
        let shot = shoot(&mut loadout, EYE, AHEAD, &mut world, &[]).unwrap();
        assert_eq!(shot.weapon, WeaponKind::Cannon);
        assert!(shot.hit.is_none());
    }

    #[test]
    fn reload_refills_from_reserve() {
        let mut weapon = Weapon::new(WeaponKind::Rifle);
        for _ in 0..5 {
            assert!(weapon.fire());
            weapon.update(0.2);
        }
        assert_eq!(weapon.current_ammo, 10);
        assert!(weapon.start_reload());
        assert!(!weapon.fire());

        assert!(!weapon.update(1.0));
        assert!(weapon.update(0.6));
        assert_eq!(weapon.current_ammo, 15);
        assert_eq!(weapon.reserve_ammo, 55);
        assert!(!weapon.start_reload(), "full magazine needs no reload");
    }

    #[test]
    fn empty_magazine_stops_firing() {
        let mut weapon = Weapon::new(WeaponKind::Cannon);
        weapon.reserve_ammo = 0;
        for _ in 0..4 {
            assert!(weapon.fire());
            weapon.update(1.0);
        }
        assert!(!weapon.fire());
        assert!(!weapon.start_reload());
    }

    #[test]
    fn switching_cancels_reload() {
        let mut loadout = Loadout::new();
        loadout.current_mut().current_ammo = 3;
        assert!(loadout.current_mut().start_reload());
        assert_eq!(loadout.switch(), WeaponKind::Cannon);
        assert_eq!(loadout.switch(), WeaponKind::Rifle);
        assert!(!loadout.current().is_reloading);
        assert_eq!(loadout.current().current_ammo, 3);
    }
}

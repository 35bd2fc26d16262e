//! Raycasting for weapon hit detection and queries.

use crate::Aabb;
use engine_core::Vec3;

/// A half-line from `origin` along the unit vector `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Build a ray, normalising `direction`. Returns `None` for a zero direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Result of a raycast query against a set of tagged boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit<T> {
    /// What was hit.
    pub target: T,
    /// Distance along the ray to the hit point.
    pub distance: f32,
    /// World position of the hit.
    pub point: Vec3,
}

/// Slab test. Returns the entry distance if the ray meets `aabb` within
/// `max_distance`; a ray starting inside the box hits at distance zero.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb, max_distance: f32) -> Option<f32> {
    let mut t_min = 0.0_f32;
    let mut t_max = max_distance;

    for axis in 0..3 {
        let o = ray.origin[axis];
        let d = ray.direction[axis];
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if d.abs() < 1e-8 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t0 = (lo - o) * inv;
        let mut t1 = (hi - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    Some(t_min)
}

/// Cast against every `(target, box)` pair and return the closest hit.
pub fn raycast_nearest<T, I>(ray: &Ray, targets: I, max_distance: f32) -> Option<RaycastHit<T>>
where
    I: IntoIterator<Item = (T, Aabb)>,
{
    let mut best: Option<RaycastHit<T>> = None;
    for (target, aabb) in targets {
        if let Some(distance) = ray_aabb(ray, &aabb, max_distance) {
            let closer = best.as_ref().map_or(true, |b| distance < b.distance);
            if closer {
                best = Some(RaycastHit {
                    target,
                    distance,
                    point: ray.point_at(distance),
                });
            }
        }
    }
    best
}

/// Distance to the first obstacle along the ray, if any within range.
pub fn first_blocker(ray: &Ray, obstacles: &[Aabb], max_distance: f32) -> Option<f32> {
    obstacles
        .iter()
        .filter_map(|ob| ray_aabb(ray, ob, max_distance))
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}

//! Axis-aligned boxes and the shared move-and-resolve routine.
//!
//! Both the player and the zombies move through [`resolve_motion`]; they only
//! differ in the [`CollisionPolicy`] they ask for.

use engine_core::Vec3;

/// Tolerance used when deciding whether a falling box started above a top face.
const LANDING_EPSILON: f32 = 1e-3;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let h = half_extents.abs();
        Self {
            min: center - h,
            max: center + h,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Strict overlap test. Boxes that only share a face do not intersect,
    /// which lets a box rest exactly on top of another.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }
}

/// How a blocked move is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Undo the whole move if the destination overlaps anything the start
    /// box did not already overlap.
    Revert,
    /// Apply X, then Z, then Y separately, rolling back only the axis that
    /// collides. A downward Y move that started above an obstacle's top face
    /// lands on it instead of being rolled back.
    SlideOnAxis,
}

/// Which axes were rolled back during a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blocked {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

/// Result of [`resolve_motion`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    pub position: Vec3,
    pub blocked: Blocked,
    /// Came to rest on top of an obstacle this move.
    pub landed: bool,
}

/// Move a box of `half_extents` centred at `position` by `delta` against
/// static `obstacles`.
pub fn resolve_motion(
    position: Vec3,
    half_extents: Vec3,
    delta: Vec3,
    obstacles: &[Aabb],
    policy: CollisionPolicy,
) -> MoveOutcome {
    match policy {
        CollisionPolicy::Revert => {
            let target = position + delta;
            let start_box = Aabb::from_center_half_extents(position, half_extents);
            let target_box = Aabb::from_center_half_extents(target, half_extents);
            // A box already stuck in an obstacle may still walk out of it.
            let hit = obstacles
                .iter()
                .any(|ob| target_box.intersects(ob) && !start_box.intersects(ob));
            if hit {
                MoveOutcome {
                    position,
                    blocked: Blocked {
                        x: delta.x != 0.0,
                        y: delta.y != 0.0,
                        z: delta.z != 0.0,
                    },
                    landed: false,
                }
            } else {
                MoveOutcome {
                    position: target,
                    blocked: Blocked::default(),
                    landed: false,
                }
            }
        }
        CollisionPolicy::SlideOnAxis => slide(position, half_extents, delta, obstacles),
    }
}

fn slide(position: Vec3, half_extents: Vec3, delta: Vec3, obstacles: &[Aabb]) -> MoveOutcome {
    let mut pos = position;
    let mut blocked = Blocked::default();
    let mut landed = false;

    if delta.x != 0.0 {
        let candidate = Vec3::new(pos.x + delta.x, pos.y, pos.z);
        if overlaps_any(&Aabb::from_center_half_extents(candidate, half_extents), obstacles) {
            blocked.x = true;
        } else {
            pos = candidate;
        }
    }

    if delta.z != 0.0 {
        let candidate = Vec3::new(pos.x, pos.y, pos.z + delta.z);
        if overlaps_any(&Aabb::from_center_half_extents(candidate, half_extents), obstacles) {
            blocked.z = true;
        } else {
            pos = candidate;
        }
    }

    if delta.y != 0.0 {
        let candidate = Vec3::new(pos.x, pos.y + delta.y, pos.z);
        let candidate_box = Aabb::from_center_half_extents(candidate, half_extents);
        let previous_bottom = pos.y - half_extents.y;

        let mut top: Option<f32> = None;
        let mut side_hit = false;
        for ob in obstacles.iter().filter(|ob| candidate_box.intersects(ob)) {
            if delta.y < 0.0 && previous_bottom >= ob.max.y - LANDING_EPSILON {
                top = Some(top.map_or(ob.max.y, |t: f32| t.max(ob.max.y)));
            } else {
                side_hit = true;
            }
        }

        if side_hit {
            blocked.y = true;
        } else if let Some(top) = top {
            let rested = Vec3::new(pos.x, top + half_extents.y, pos.z);
            // The snapped box only touches the top face, so it is valid unless
            // some other obstacle occupies that spot.
            if overlaps_any(&Aabb::from_center_half_extents(rested, half_extents), obstacles) {
                blocked.y = true;
            } else {
                pos = rested;
                landed = true;
            }
        } else {
            pos = candidate;
        }
    }

    MoveOutcome {
        position: pos,
        blocked,
        landed,
    }
}

/// True if `aabb` overlaps at least one of `obstacles`.
pub fn overlaps_any(aabb: &Aabb, obstacles: &[Aabb]) -> bool {
    obstacles.iter().any(|ob| aabb.intersects(ob))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(center: Vec3) -> Aabb {
        Aabb::from_center_half_extents(center, Vec3::splat(1.0))
    }

    #[test]
    fn touching_faces_do_not_intersect() {
        let a = unit_box_at(Vec3::ZERO);
        let b = unit_box_at(Vec3::new(2.0, 0.0, 0.0));
        assert!(!a.intersects(&b));
        let c = unit_box_at(Vec3::new(1.9, 0.0, 0.0));
        assert!(a.intersects(&c));
    }

    #[test]
    fn revert_undoes_the_whole_step() {
        let wall = [Aabb::new(Vec3::new(2.0, 0.0, -5.0), Vec3::new(3.0, 2.0, 5.0))];
        let start = Vec3::new(0.0, 1.0, 0.0);
        let out = resolve_motion(
            start,
            Vec3::new(0.5, 1.0, 0.5),
            Vec3::new(2.0, 0.0, 1.0),
            &wall,
            CollisionPolicy::Revert,
        );
        assert_eq!(out.position, start);
        assert!(out.blocked.x && out.blocked.z && !out.blocked.y);
    }

    #[test]
    fn revert_lets_a_stuck_box_walk_out() {
        let crate_box = [Aabb::from_center_half_extents(Vec3::new(0.0, 1.5, 0.0), Vec3::splat(1.5))];
        let wall = Aabb::new(Vec3::new(-5.0, 0.0, 3.0), Vec3::new(5.0, 3.0, 4.0));
        let half = Vec3::new(0.5, 1.0, 0.5);

        let out = resolve_motion(Vec3::new(0.0, 1.0, 0.0), half, Vec3::new(0.0, 0.0, 0.05), &crate_box, CollisionPolicy::Revert);
        assert_eq!(out.position, Vec3::new(0.0, 1.0, 0.05));

        // Escaping one obstacle still may not enter another.
        let obstacles = [crate_box[0], wall];
        let out = resolve_motion(Vec3::new(0.0, 1.0, 1.9), half, Vec3::new(0.0, 0.0, 0.7), &obstacles, CollisionPolicy::Revert);
        assert_eq!(out.position, Vec3::new(0.0, 1.0, 1.9));
    }

    #[test]
    fn slide_keeps_the_free_axis() {
        let wall = [Aabb::new(Vec3::new(2.0, 0.0, -5.0), Vec3::new(3.0, 2.0, 5.0))];
        let out = resolve_motion(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.5, 1.0, 0.5),
            Vec3::new(2.0, 0.0, 1.0),
            &wall,
            CollisionPolicy::SlideOnAxis,
        );
        assert_eq!(out.position, Vec3::new(0.0, 1.0, 1.0));
        assert!(out.blocked.x);
        assert!(!out.blocked.z);
    }

    #[test]
    fn falling_onto_a_top_face_lands() {
        let crate_box = [Aabb::new(Vec3::new(-2.0, 0.0, -2.0), Vec3::new(2.0, 3.0, 2.0))];
        let half = Vec3::new(0.5, 1.0, 0.5);
        let out = resolve_motion(
            Vec3::new(0.0, 4.1, 0.0),
            half,
            Vec3::new(0.0, -0.5, 0.0),
            &crate_box,
            CollisionPolicy::SlideOnAxis,
        );
        assert!(out.landed);
        assert!((out.position.y - 4.0).abs() < 1e-6);
        assert!(!Aabb::from_center_half_extents(out.position, half).intersects(&crate_box[0]));
    }

    #[test]
    fn rising_into_an_obstacle_is_a_side_hit() {
        let ledge = [Aabb::new(Vec3::new(-2.0, 3.0, -2.0), Vec3::new(2.0, 4.0, 2.0))];
        let start = Vec3::new(0.0, 1.5, 0.0);
        let out = resolve_motion(
            start,
            Vec3::new(0.5, 1.0, 0.5),
            Vec3::new(0.0, 0.8, 0.0),
            &ledge,
            CollisionPolicy::SlideOnAxis,
        );
        assert_eq!(out.position, start);
        assert!(out.blocked.y);
        assert!(!out.landed);
    }
}

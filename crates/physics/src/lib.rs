//! Collision and ray queries for the arena simulation.
//!
//! Everything here works on axis-aligned boxes: obstacles, walls, the player
//! and every zombie are approximated by an [`Aabb`].

pub mod collision;
pub mod raycast;

pub use collision::*;
pub use raycast::*;

//! Procedural generation for zombie waves and arena layouts.

pub mod arena;
pub mod wave;

pub use arena::*;
pub use wave::*;

//! Time management for the game loop.

use std::time::{Duration, Instant};

/// Longest real frame fed into the accumulator. Anything slower (a debugger
/// break, a suspended laptop) is treated as this long so the fixed-step loop
/// never tries to catch up on minutes of simulation.
const MAX_FRAME: Duration = Duration::from_millis(250);

/// Manages frame timing and the fixed simulation timestep.
#[derive(Debug)]
pub struct Time {
    /// Time of the last frame.
    last_frame: Instant,
    /// Duration of the last frame (clamped to `MAX_FRAME`).
    delta: Duration,
    /// Frame count since start.
    frame_count: u64,
    /// Fixed timestep for simulation (default 60 Hz).
    fixed_timestep: Duration,
    /// Accumulated time for fixed updates.
    accumulator: Duration,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    /// Create a new time manager.
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            frame_count: 0,
            fixed_timestep: Duration::from_secs_f64(1.0 / 60.0),
            accumulator: Duration::ZERO,
        }
    }

    /// Update timing at the start of a new frame from the wall clock.
    pub fn update(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;
        self.advance(delta);
    }

    /// Advance by an explicit duration. Headless runs and tests drive the
    /// clock through this instead of the wall clock.
    pub fn advance(&mut self, delta: Duration) {
        self.delta = delta.min(MAX_FRAME);
        self.frame_count += 1;
        self.accumulator += self.delta;
    }

    /// Get the delta time in seconds.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Get the current frame count.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Get the fixed timestep in seconds.
    pub fn fixed_timestep_seconds(&self) -> f32 {
        self.fixed_timestep.as_secs_f32()
    }

    /// Check if a fixed update should run and consume the time.
    pub fn should_fixed_update(&mut self) -> bool {
        if self.accumulator >= self.fixed_timestep {
            self.accumulator -= self.fixed_timestep;
            true
        } else {
            false
        }
    }

    /// Set the fixed timestep rate in Hz.
    pub fn set_fixed_rate(&mut self, hz: f64) {
        self.fixed_timestep = Duration::from_secs_f64(1.0 / hz);
    }
}

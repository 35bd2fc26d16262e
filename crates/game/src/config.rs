//! Game configuration (difficulty, arena, wave timing, backend). Loaded from config.ron at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use procgen::{ArenaConfig, Difficulty};

use crate::score::RewardPolicy;
use crate::waves::DirectorSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Where waves come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum BackendConfig {
    /// Built-in generator.
    #[default]
    Procedural,
    /// External generator program speaking JSON on stdin/stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Persistent game settings. Loaded from `config.ron` in the current directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Mouse sensitivity multiplier (1.0 = default).
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    /// Side length of the square arena.
    #[serde(default = "default_arena_size")]
    pub arena_size: f32,
    #[serde(default = "default_obstacle_count")]
    pub obstacle_count: usize,
    /// Fixed layout and spawn seed. Random when unset.
    #[serde(default)]
    pub arena_seed: Option<u64>,
    /// Seconds between a cleared wave and the next request.
    #[serde(default = "default_clear_delay")]
    pub clear_delay: f32,
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout: f32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f32,
    #[serde(default = "default_max_retries")]
    pub max_generation_retries: u32,
    #[serde(default)]
    pub rewards: RewardPolicy,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default = "default_high_score_path")]
    pub high_score_path: PathBuf,
    /// Simulated seconds for the headless runner.
    #[serde(default = "default_headless_seconds")]
    pub headless_seconds: f32,
}

fn default_sensitivity() -> f32 {
    1.0
}
fn default_arena_size() -> f32 {
    100.0
}
fn default_obstacle_count() -> usize {
    8
}
fn default_clear_delay() -> f32 {
    3.0
}
fn default_generation_timeout() -> f32 {
    10.0
}
fn default_retry_delay() -> f32 {
    2.0
}
fn default_max_retries() -> u32 {
    3
}
fn default_high_score_path() -> PathBuf {
    PathBuf::from("highscore.ron")
}
fn default_headless_seconds() -> f32 {
    120.0
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            sensitivity: default_sensitivity(),
            arena_size: default_arena_size(),
            obstacle_count: default_obstacle_count(),
            arena_seed: None,
            clear_delay: default_clear_delay(),
            generation_timeout: default_generation_timeout(),
            retry_delay: default_retry_delay(),
            max_generation_retries: default_max_retries(),
            rewards: RewardPolicy::default(),
            backend: BackendConfig::default(),
            high_score_path: default_high_score_path(),
            headless_seconds: default_headless_seconds(),
        }
    }
}

impl GameConfig {
    /// Load config from `config.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Invalid config at {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_ron(&data)
    }

    pub fn from_ron(data: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(data)?;
        Ok(config.sanitized())
    }

    /// Pull out-of-range values back to something playable.
    fn sanitized(mut self) -> Self {
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            self.sensitivity = default_sensitivity();
        }
        if !(self.arena_size.is_finite() && self.arena_size >= 20.0) {
            log::warn!("Arena size {} too small, using 20", self.arena_size);
            self.arena_size = 20.0;
        }
        self.clear_delay = self.clear_delay.max(0.0);
        self.retry_delay = self.retry_delay.max(0.0);
        if !(self.generation_timeout > 0.0) {
            self.generation_timeout = default_generation_timeout();
        }
        self
    }

    pub fn arena(&self) -> ArenaConfig {
        ArenaConfig {
            size: self.arena_size,
            obstacle_count: self.obstacle_count,
            ..ArenaConfig::default()
        }
    }

    pub fn director(&self) -> DirectorSettings {
        DirectorSettings {
            clear_delay: self.clear_delay,
            generation_timeout: self.generation_timeout,
            retry_delay: self.retry_delay,
            max_retries: self.max_generation_retries,
        }
    }
}

fn config_path() -> std::path::PathBuf {
    std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from(".")).join("config.ron")
}

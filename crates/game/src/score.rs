//! Scoring, kill rewards and the persisted high score.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use procgen::ZombieKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage key of the high score.
pub const HIGH_SCORE_KEY: &str = "zombie-rampage-highscore";

/// Points and drops awarded per kill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    pub kill_points: u64,
    /// Probability of the random bonus on any kill.
    pub bonus_chance: f64,
    pub bonus_points: u64,
    /// Kind that always pays extra and drops a supply crate.
    pub rare_kind: Option<ZombieKind>,
    pub rare_points: u64,
    pub rare_drops_crate: bool,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            kill_points: 100,
            bonus_chance: 0.1,
            bonus_points: 50,
            rare_kind: Some(ZombieKind::Brute),
            rare_points: 250,
            rare_drops_crate: true,
        }
    }
}

/// Outcome of one kill under a [`RewardPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reward {
    pub points: u64,
    pub bonus: bool,
    pub drops_crate: bool,
}

impl RewardPolicy {
    pub fn reward<R: Rng + ?Sized>(&self, kind: ZombieKind, rng: &mut R) -> Reward {
        let mut points = self.kill_points;
        let chance = self.bonus_chance.clamp(0.0, 1.0);
        let bonus = chance > 0.0 && rng.gen_bool(chance);
        if bonus {
            points += self.bonus_points;
        }

        let rare = self.rare_kind == Some(kind);
        if rare {
            points += self.rare_points;
        }

        Reward {
            points,
            bonus,
            drops_crate: rare && self.rare_drops_crate,
        }
    }
}

/// Running score of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Score {
    pub points: u64,
    pub kills: u32,
}

impl Score {
    pub fn add_kill(&mut self, points: u64) {
        self.points += points;
        self.kills += 1;
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("high score file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("high score file is not valid RON: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("could not serialize high scores: {0}")]
    Serialize(#[from] ron::Error),
}

/// Where the high score lives between sessions.
pub trait HighScoreStore {
    fn load(&self) -> Result<u64, PersistError>;
    fn store(&mut self, score: u64) -> Result<(), PersistError>;
}

/// RON map of `key -> score` on disk. Other keys in the file are preserved.
#[derive(Debug, Clone)]
pub struct FileScoreStore {
    path: PathBuf,
}

impl FileScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, u64>, PersistError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = std::fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(ron::from_str(&data)?)
    }
}

impl HighScoreStore for FileScoreStore {
    fn load(&self) -> Result<u64, PersistError> {
        Ok(self.read_map()?.get(HIGH_SCORE_KEY).copied().unwrap_or(0))
    }

    fn store(&mut self, score: u64) -> Result<(), PersistError> {
        let mut map = self.read_map().unwrap_or_else(|e| {
            log::warn!("Replacing unreadable high score file {:?}: {}", self.path, e);
            BTreeMap::new()
        });
        map.insert(HIGH_SCORE_KEY.to_string(), score);
        let text = ron::ser::to_string_pretty(&map, ron::ser::PrettyConfig::default())?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    pub value: u64,
    /// Number of successful writes.
    pub writes: usize,
}

impl MemoryScoreStore {
    pub fn with_value(value: u64) -> Self {
        Self { value, writes: 0 }
    }
}

impl HighScoreStore for MemoryScoreStore {
    fn load(&self) -> Result<u64, PersistError> {
        Ok(self.value)
    }

    fn store(&mut self, score: u64) -> Result<(), PersistError> {
        self.value = score;
        self.writes += 1;
        Ok(())
    }
}

/// Write `score` only if it beats `high_score`. Returns whether it was written.
pub fn record_high_score(
    store: &mut dyn HighScoreStore,
    high_score: u64,
    score: u64,
) -> Result<bool, PersistError> {
    if score <= high_score {
        return Ok(false);
    }
    store.store(score)?;
    Ok(true)
}

//! Zombie Rampage - wave survival arena simulation.
//!
//! The crate is headless. A shell samples [`input::Controls`] each tick,
//! calls [`session::Session::tick`], and draws from
//! [`session::Session::hud`] and [`session::Session::render_frame`].

pub mod backend;
pub mod config;
pub mod effects;
pub mod events;
pub mod horde_ai;
pub mod pickup;
pub mod player;
pub mod score;
pub mod session;
pub mod snapshot;
pub mod spawner;
pub mod waves;
pub mod weapons;
pub mod zombie;

pub use backend::{
    CommandService, GenerationError, ProceduralBackend, ServiceBackend, Ticket, WaveBackend, WaveRequest,
    WaveResponse, WaveService,
};
pub use config::{BackendConfig, ConfigError, GameConfig};
pub use events::GameEvent;
pub use score::{FileScoreStore, HighScoreStore, MemoryScoreStore, RewardPolicy, HIGH_SCORE_KEY};
pub use session::{Session, SessionSettings, SimulationState, WaveState};
pub use snapshot::{HudPhase, HudState, RenderFrame};
pub use waves::{DirectorSettings, WaveDirector, WavePhase};

//! Zombie Rampage headless runner: plays the simulation with a simple
//! autopilot at a fixed 60 Hz step and logs what happens.

use std::f32::consts::{PI, TAU};
use std::time::Duration;

use anyhow::{Context, Result};
use engine_core::{yaw_of, Time, Transform, Vec2};
use game::zombie::Zombie;
use game::{
    BackendConfig, CommandService, FileScoreStore, GameConfig, GameEvent, HudPhase, ProceduralBackend,
    ServiceBackend, Session, SessionSettings, WaveBackend,
};
use input::Controls;
use procgen::generate_arena;
use rand::{rngs::StdRng, SeedableRng};

/// Seconds between HUD summaries in the log.
const REPORT_INTERVAL: f32 = 5.0;
/// Aim error (radians) at which the autopilot pulls the trigger.
const FIRE_CONE: f32 = 0.04;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GameConfig::load();
    log::info!(
        "Starting Zombie Rampage ({:?}, arena {}m, {} obstacles)",
        config.difficulty,
        config.arena_size,
        config.obstacle_count
    );

    let mut rng = match config.arena_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let arena = generate_arena(&config.arena(), &mut rng);

    let backend: Box<dyn WaveBackend> = match &config.backend {
        BackendConfig::Procedural => Box::new(ProceduralBackend::new(config.arena_seed)),
        BackendConfig::Command { program, args } => {
            log::info!("Generating waves with `{}`", program);
            let service = CommandService::new(program.clone(), args.clone())
                .with_timeout(Duration::from_secs_f32(config.generation_timeout));
            Box::new(ServiceBackend::spawn(service).context("could not start the wave service worker")?)
        }
    };
    let scores = Box::new(FileScoreStore::new(config.high_score_path.clone()));

    let mut session = Session::new(SessionSettings::from_config(&config), arena, backend, scores);
    for event in session.start() {
        log_event(&event);
    }

    let mut time = Time::new();
    let step = time.fixed_timestep_seconds();
    let frame = Duration::from_secs_f32(step);
    let mut pilot = Autopilot::new(config.sensitivity);
    let mut simulated = 0.0_f32;
    let mut next_report = REPORT_INTERVAL;

    'run: while simulated < config.headless_seconds {
        // Headless: the clock advances by exactly one step per frame.
        time.advance(frame);
        while time.should_fixed_update() {
            let controls = pilot.controls(&session);
            for event in session.tick(step, &controls) {
                log_event(&event);
            }
            simulated += step;

            if session.hud().phase == HudPhase::GameOver {
                break 'run;
            }
            if session.state().director.awaiting_manual_retry() {
                for event in session.retry_wave() {
                    log_event(&event);
                }
            }
        }

        if simulated >= next_report {
            next_report += REPORT_INTERVAL;
            let hud = session.hud();
            log::info!(
                "t={:>5.1}s wave {} | zombies {} | health {:.0} | score {} (best {}) | {} {}",
                simulated,
                hud.wave,
                hud.zombies_remaining,
                hud.health,
                hud.score,
                hud.high_score,
                hud.weapon.name(),
                session.state().player.loadout.current().ammo_display()
            );
        }
    }

    for event in session.end() {
        log_event(&event);
    }
    let hud = session.hud();
    log::info!(
        "Run finished after {:.1}s on wave {} with {} points ({} kills)",
        simulated,
        hud.wave,
        hud.score,
        session.state().score.kills
    );
    Ok(())
}

fn log_event(event: &GameEvent) {
    match event {
        GameEvent::WaveStarted { message, zombies, .. } => log::info!("{} ({} zombies)", message, zombies),
        GameEvent::WaveCleared { wave } => log::info!("Wave {} cleared", wave),
        GameEvent::GenerationFailed { wave, error, will_retry } => {
            log::warn!("Wave {} failed: {} (retrying: {})", wave, error, will_retry)
        }
        GameEvent::ZombieKilled { kind, points, .. } => log::debug!("Killed a {} (+{})", kind.name(), points),
        GameEvent::PlayerDamaged { amount, health } => log::debug!("Bitten for {} ({} left)", amount, health),
        GameEvent::PickupCollected { kind } => log::info!("Picked up {}", kind.describe()),
        GameEvent::NewHighScore { score } => log::info!("New high score: {}", score),
        GameEvent::GameOver { score, wave } => log::info!("GAME OVER on wave {} with {} points", wave, score),
        other => log::trace!("{:?}", other),
    }
}

/// Turns toward the nearest zombie, shoots when lined up and backs away
/// from anything too close.
struct Autopilot {
    /// Radians per pointer pixel the session applies.
    radians_per_pixel: f32,
    strafe_timer: f32,
    strafe_right: bool,
}

impl Autopilot {
    fn new(sensitivity: f32) -> Self {
        Self {
            radians_per_pixel: game::player::MovementTuning::with_sensitivity(sensitivity).pointer_sensitivity,
            strafe_timer: 0.0,
            strafe_right: true,
        }
    }

    fn controls(&mut self, session: &Session) -> Controls {
        let state = session.state();
        let player = &state.player;
        let eye = player.eye_position();

        self.strafe_timer -= 1.0 / 60.0;
        if self.strafe_timer <= 0.0 {
            self.strafe_timer = 2.0;
            self.strafe_right = !self.strafe_right;
        }

        let nearest = state
            .world
            .query::<(&Transform, &Zombie)>()
            .iter()
            .filter(|(_, (_, z))| z.alive)
            .map(|(_, (t, _))| t.position)
            .min_by(|a, b| a.distance_squared(eye).total_cmp(&b.distance_squared(eye)));

        let mut controls = Controls {
            pointer_captured: true,
            right: self.strafe_right,
            left: !self.strafe_right,
            ..Default::default()
        };

        let Some(target) = nearest else {
            return controls;
        };

        let to_target = target - eye;
        let distance = to_target.length();
        let desired_yaw = yaw_of(to_target);
        let desired_pitch = (to_target.y / distance.max(1e-3)).clamp(-1.0, 1.0).asin();
        let yaw_error = wrap_angle(desired_yaw - player.yaw);
        let pitch_error = desired_pitch - player.pitch;

        // yaw -= dx * k, pitch -= dy * k
        controls.look_delta = Vec2::new(-yaw_error, -pitch_error) / self.radians_per_pixel;
        controls.shoot = yaw_error.abs() < FIRE_CONE && pitch_error.abs() < FIRE_CONE;
        controls.backward = distance < 6.0;
        controls.sprint = distance < 3.0;
        controls
    }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

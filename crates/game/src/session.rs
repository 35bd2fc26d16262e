//! A game session: owns the simulation state and runs one tick at a time.
//!
//! Tick order is fixed: input, player, zombie AI, combat, cleanup, wave
//! director, effects.

use engine_core::{Transform, Vec3};
use hecs::{Entity, World};
use input::Controls;
use procgen::{Arena, Difficulty, WaveContext};
use rand::prelude::*;

use crate::backend::WaveBackend;
use crate::config::GameConfig;
use crate::effects::{Effects, HitFlash, Tracer};
use crate::events::GameEvent;
use crate::horde_ai::HordeAI;
use crate::pickup::{self, Pickup, PickupKind};
use crate::player::{MovementTuning, PlayerController};
use crate::score::{record_high_score, HighScoreStore, RewardPolicy, Score};
use crate::snapshot::{
    obstacle_color, zombie_color, HudPhase, HudState, InstanceData, ObstacleInstance, RenderFrame, FLASH_COLOR,
};
use crate::spawner::{SpawnSettings, ZombieSpawner};
use crate::waves::{DirectorSettings, WaveDirector, WavePhase};
use crate::weapons;
use crate::zombie::{count_alive, DamageOutcome, Zombie};

/// Tunables fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub difficulty: Difficulty,
    pub tuning: MovementTuning,
    pub spawn: SpawnSettings,
    pub director: DirectorSettings,
    pub rewards: RewardPolicy,
    /// Seeds spawn placement and reward rolls.
    pub seed: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            tuning: MovementTuning::default(),
            spawn: SpawnSettings::default(),
            director: DirectorSettings::default(),
            rewards: RewardPolicy::default(),
            seed: None,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            difficulty: config.difficulty,
            tuning: MovementTuning::with_sensitivity(config.sensitivity),
            spawn: SpawnSettings::default(),
            director: config.director(),
            rewards: config.rewards.clone(),
            seed: config.arena_seed,
        }
    }
}

/// All mutable simulation state, owned by the session.
pub struct SimulationState {
    pub world: World,
    pub player: PlayerController,
    pub arena: Arena,
    pub director: WaveDirector,
    pub score: Score,
    /// Best score known to the store when the session began.
    pub high_score: u64,
    pub effects: Effects,
    /// Seconds survived in the current run.
    pub time_survived: f32,
}

/// Wave progress as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveState {
    pub wave: u32,
    pub zombies_remaining: usize,
    /// A wave is being fought or generated.
    pub in_progress: bool,
    pub phase: WavePhase,
}

pub struct Session {
    state: SimulationState,
    settings: SessionSettings,
    backend: Box<dyn WaveBackend>,
    scores: Box<dyn HighScoreStore>,
    spawner: ZombieSpawner,
    ai: HordeAI,
    rng: StdRng,
    running: bool,
    paused: bool,
    score_recorded: bool,
    /// `end` ran; the next `start` begins from a clean slate.
    ended: bool,
}

impl Session {
    pub fn new(
        settings: SessionSettings,
        arena: Arena,
        backend: Box<dyn WaveBackend>,
        scores: Box<dyn HighScoreStore>,
    ) -> Self {
        let high_score = scores.load().unwrap_or_else(|e| {
            log::warn!("Could not read high score: {}", e);
            0
        });
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };

        Self {
            state: SimulationState {
                world: World::new(),
                player: PlayerController::new(PlayerController::spawn_point()),
                arena,
                director: WaveDirector::new(settings.director),
                score: Score::default(),
                high_score,
                effects: Effects::new(),
                time_survived: 0.0,
            },
            spawner: ZombieSpawner::new(settings.spawn, settings.seed),
            settings,
            backend,
            scores,
            ai: HordeAI::new(),
            rng,
            running: false,
            paused: false,
            score_recorded: false,
            ended: false,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Direct access for tools and scripted scenarios.
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn context(&self) -> WaveContext {
        WaveContext {
            difficulty: self.settings.difficulty,
            player_score: self.state.score.points,
            time_survived: self.state.time_survived,
            player_health: self.state.player.health.current,
        }
    }

    /// Begin play: requests wave 1. After `end` the previous run's world,
    /// player and score are cleared first.
    pub fn start(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.running {
            return events;
        }
        if self.ended {
            self.reset_run();
        }
        self.running = true;
        self.paused = false;
        let context = self.context();
        self.state.director.start(self.backend.as_mut(), &context, &mut events);
        events
    }

    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            log::debug!("Session {}", if paused { "paused" } else { "resumed" });
        }
        self.paused = paused;
    }

    /// Advance the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32, controls: &Controls) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if !self.running || self.paused || dt <= 0.0 {
            return events;
        }

        if matches!(self.state.director.phase(), WavePhase::GameOver { .. }) {
            self.state.effects.update(&mut self.state.world, dt);
            return events;
        }

        self.state.time_survived += dt;
        self.update_player(dt, controls, &mut events);
        self.update_horde(dt, &mut events);
        if !self.state.player.is_dead() {
            self.update_combat(dt, controls, &mut events);
        }
        self.cleanup();
        self.update_director(dt, &mut events);
        self.state.effects.update(&mut self.state.world, dt);

        events
    }

    fn update_player(&mut self, dt: f32, controls: &Controls, events: &mut Vec<GameEvent>) {
        let state = &mut self.state;
        let loadout = &mut state.player.loadout;

        if controls.switch_weapon {
            let weapon = loadout.switch();
            events.push(GameEvent::WeaponSwitched { weapon });
        }
        if controls.reload && loadout.current_mut().start_reload() {
            events.push(GameEvent::ReloadStarted { weapon: loadout.current().kind });
        }
        if let Some(weapon) = loadout.update(dt) {
            events.push(GameEvent::ReloadFinished { weapon });
        }

        state.player.update(dt, controls, &state.arena, &self.settings.tuning);
    }

    fn update_horde(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        let state = &mut self.state;
        let hit = self
            .ai
            .update(&mut state.world, &mut state.player, state.arena.colliders(), dt);
        if let Some(hit) = hit {
            state.effects.player_damaged();
            events.push(GameEvent::PlayerDamaged {
                amount: hit.damage,
                health: state.player.health.current,
            });
        }
    }

    fn update_combat(&mut self, dt: f32, controls: &Controls, events: &mut Vec<GameEvent>) {
        let state = &mut self.state;

        if controls.shoot {
            let origin = state.player.eye_position();
            let direction = state.player.view_direction();
            let shot = weapons::shoot(
                &mut state.player.loadout,
                origin,
                direction,
                &mut state.world,
                state.arena.colliders(),
            );

            if let Some(shot) = shot {
                events.push(GameEvent::ShotFired {
                    weapon: shot.weapon,
                    hit: shot.hit.map(|h| h.target),
                });

                if let Some(hit) = shot.hit {
                    match hit.outcome {
                        DamageOutcome::Wounded { remaining } => events.push(GameEvent::ZombieHit {
                            entity: hit.target,
                            damage: hit.damage,
                            remaining,
                        }),
                        DamageOutcome::Killed => {
                            award_kill(state, &self.settings.rewards, &mut self.rng, hit.target, events)
                        }
                        DamageOutcome::Ignored => {}
                    }
                }

                let weapon = state.player.loadout.current_mut();
                if weapon.current_ammo == 0 && weapon.start_reload() {
                    events.push(GameEvent::ReloadStarted { weapon: weapon.kind });
                }
            }
        }

        for kind in pickup::update_pickups(&mut state.world, state.player.position, dt) {
            match kind {
                PickupKind::Health(amount) => state.player.heal(amount),
                PickupKind::Ammo(rounds) => state.player.loadout.current_mut().add_reserve(rounds),
            }
            state.effects.toast(kind.describe());
            events.push(GameEvent::PickupCollected { kind });
        }
    }

    /// Despawn dead zombies so the live set only holds the living.
    fn cleanup(&mut self) {
        let dead: Vec<Entity> = self
            .state
            .world
            .query::<&Zombie>()
            .iter()
            .filter(|(_, z)| !z.alive)
            .map(|(e, _)| e)
            .collect();
        for entity in dead {
            self.state.world.despawn(entity).ok();
        }
    }

    fn update_director(&mut self, dt: f32, events: &mut Vec<GameEvent>) {
        if self.state.player.is_dead() {
            if self.state.director.game_over(self.backend.as_mut()) {
                self.finish(events);
                events.push(GameEvent::GameOver {
                    score: self.state.score.points,
                    wave: self.state.director.wave(),
                });
                self.state.effects.banner("Game Over");
            }
            return;
        }

        let context = self.context();
        let alive = count_alive(&self.state.world);
        let first = events.len();
        let arrived = self
            .state
            .director
            .update(dt, alive, self.backend.as_mut(), &context, events);

        if let Some(wave) = arrived {
            let state = &mut self.state;
            let report = self
                .spawner
                .spawn_wave(&mut state.world, &wave.zombies, &state.arena, state.player.position);
            log::debug!("Spawned {} zombies ({} without a clear spot)", report.spawned.len(), report.exhausted);
            state.effects.banner(wave.message);
        }

        for event in &events[first..] {
            match event {
                GameEvent::WaveCleared { wave } => self.state.effects.banner(format!("Wave {} cleared!", wave)),
                GameEvent::GenerationFailed { will_retry, .. } => {
                    let text = if *will_retry {
                        "Wave generation failed, retrying..."
                    } else {
                        "Wave generation failed. Retry when ready."
                    };
                    self.state.effects.toast(text);
                }
                _ => {}
            }
        }
    }

    /// Persist the score once per run.
    fn finish(&mut self, events: &mut Vec<GameEvent>) {
        if self.score_recorded {
            return;
        }
        self.score_recorded = true;
        let score = self.state.score.points;
        match record_high_score(self.scores.as_mut(), self.state.high_score, score) {
            Ok(true) => {
                log::info!("New high score: {}", score);
                self.state.high_score = score;
                events.push(GameEvent::NewHighScore { score });
            }
            Ok(false) => {}
            Err(e) => log::warn!("Could not save high score: {}", e),
        }
    }

    /// Ask for the current wave again after automatic retries ran out.
    pub fn retry_wave(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let context = self.context();
        if !self.state.director.retry_wave(self.backend.as_mut(), &context, &mut events) {
            log::debug!("Nothing to retry");
        }
        events
    }

    /// Stop the run. In-flight generation is abandoned.
    pub fn end(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.running {
            self.finish(&mut events);
        }
        self.running = false;
        self.paused = false;
        self.ended = true;
        self.state.director.reset(self.backend.as_mut());
        events
    }

    /// End the current run and start a fresh one in the same arena.
    pub fn restart(&mut self) -> Vec<GameEvent> {
        let mut events = self.end();
        events.extend(self.start());
        events
    }

    fn reset_run(&mut self) {
        let state = &mut self.state;
        state.world.clear();
        state.player = PlayerController::new(PlayerController::spawn_point());
        state.score = Score::default();
        state.effects.clear();
        state.time_survived = 0.0;
        self.score_recorded = false;
        self.ended = false;
    }

    pub fn wave_state(&self) -> WaveState {
        let phase = self.state.director.phase();
        WaveState {
            wave: phase.wave(),
            zombies_remaining: count_alive(&self.state.world),
            in_progress: matches!(phase, WavePhase::Active { .. }) || self.state.director.in_flight(),
            phase,
        }
    }

    pub fn hud(&self) -> HudState {
        let state = &self.state;
        let weapon = state.player.loadout.current();
        let phase = match state.director.phase() {
            WavePhase::GameOver { .. } => HudPhase::GameOver,
            _ if !self.running => HudPhase::Ready,
            _ if self.paused => HudPhase::Paused,
            WavePhase::Cleared { .. } => HudPhase::WaveCleared,
            _ => HudPhase::Playing,
        };

        HudState {
            score: state.score.points,
            high_score: state.high_score.max(state.score.points),
            wave: state.director.wave(),
            health: state.player.health.current,
            zombies_remaining: count_alive(&state.world),
            wave_message: state.effects.wave_message().to_string(),
            player_message: state.effects.player_message().to_string(),
            ammo: weapon.current_ammo,
            reserve_ammo: weapon.reserve_ammo,
            reloading: weapon.is_reloading,
            weapon: weapon.kind,
            damaged: state.effects.damage_overlay_active(),
            phase,
        }
    }

    pub fn render_frame(&self) -> RenderFrame {
        let state = &self.state;
        let world = &state.world;
        let player = &state.player;
        let camera = RenderFrame::camera_transform(player.eye_position(), player.yaw, player.pitch);

        let zombies = world
            .query::<(&Transform, &Zombie, Option<&HitFlash>)>()
            .iter()
            .filter(|(_, (_, z, _))| z.alive)
            .map(|(_, (transform, zombie, flash))| {
                let sized = Transform {
                    scale: zombie.kind.half_extents() * 2.0,
                    ..*transform
                };
                let color = if flash.is_some() { FLASH_COLOR } else { zombie_color(zombie.kind) };
                InstanceData::new(&sized, color)
            })
            .collect();

        let obstacles = state
            .arena
            .obstacles
            .iter()
            .map(|ob| ObstacleInstance {
                shape: ob.shape,
                instance: InstanceData::new(
                    &Transform::from_position_scale(ob.aabb.center(), ob.aabb.size()),
                    obstacle_color(ob.shape),
                ),
            })
            .collect();

        let tracers = world
            .query::<(&Transform, &Tracer)>()
            .iter()
            .map(|(_, (transform, _))| {
                let streak = Transform {
                    scale: Vec3::new(0.05, 0.05, 1.0),
                    ..*transform
                };
                InstanceData::new(&streak, [1.0, 0.9, 0.4, 1.0])
            })
            .collect();

        let pickups = world
            .query::<(&Transform, &Pickup)>()
            .iter()
            .map(|(_, (transform, crate_))| {
                let color = match crate_.kind {
                    PickupKind::Health(_) => [0.9, 0.2, 0.2, 1.0],
                    PickupKind::Ammo(_) => [0.9, 0.8, 0.2, 1.0],
                };
                InstanceData::new(transform, color)
            })
            .collect();

        RenderFrame {
            camera: (&camera).into(),
            camera_position: camera.position,
            camera_forward: player.view_direction(),
            zombies,
            obstacles,
            tracers,
            pickups,
        }
    }
}

/// Score a kill and drop the rare-kind crate.
fn award_kill(
    state: &mut SimulationState,
    rewards: &RewardPolicy,
    rng: &mut StdRng,
    entity: Entity,
    events: &mut Vec<GameEvent>,
) {
    let (kind, position) = {
        let Ok(mut query) = state.world.query_one::<(&Zombie, &Transform)>(entity) else {
            return;
        };
        let Some((zombie, transform)) = query.get() else {
            return;
        };
        (zombie.kind, transform.position)
    };

    let reward = rewards.reward(kind, rng);
    state.score.add_kill(reward.points);
    events.push(GameEvent::ZombieKilled {
        entity,
        kind,
        points: reward.points,
    });
    if reward.bonus {
        state.effects.toast(format!("Bonus +{}", rewards.bonus_points));
    }

    if reward.drops_crate {
        let kind = PickupKind::roll(rng);
        pickup::spawn_pickup(&mut state.world, position, kind);
        events.push(GameEvent::PickupSpawned { kind });
    }
}

//! Wave progression state machine.
//!
//! ```text
//! Idle --start--> (request 1) --reply--> Active(1)
//! Active(n) --last zombie down--> Cleared(n) --delay--> (request n+1) --reply--> Active(n+1)
//! any --player dead--> GameOver
//! ```
//!
//! Only one request is ever outstanding. Replies whose ticket does not match
//! the outstanding one (timed out, or from before a reset) are dropped.

use procgen::{GeneratedWave, WaveContext};

use crate::backend::{GenerationError, Ticket, WaveBackend, WaveRequest};
use crate::events::GameEvent;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WavePhase {
    /// Setup wave 0. Nothing spawned yet.
    Idle,
    Active { wave: u32 },
    /// `resume_at` is the director clock time the next request goes out.
    Cleared { wave: u32, resume_at: f64 },
    GameOver { wave: u32 },
}

impl WavePhase {
    pub fn wave(&self) -> u32 {
        match *self {
            WavePhase::Idle => 0,
            WavePhase::Active { wave } | WavePhase::Cleared { wave, .. } | WavePhase::GameOver { wave } => wave,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WavePhase::Idle => "idle",
            WavePhase::Active { .. } => "active",
            WavePhase::Cleared { .. } => "cleared",
            WavePhase::GameOver { .. } => "game over",
        }
    }
}

/// Timing and retry tuning.
#[derive(Debug, Clone, Copy)]
pub struct DirectorSettings {
    /// Pause between clearing a wave and requesting the next.
    pub clear_delay: f32,
    pub generation_timeout: f32,
    pub retry_delay: f32,
    /// Consecutive failed attempts retried automatically. After that the
    /// director waits for [`WaveDirector::retry_wave`].
    pub max_retries: u32,
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            clear_delay: 3.0,
            generation_timeout: 10.0,
            retry_delay: 2.0,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    ticket: Ticket,
    sent_at: f64,
}

/// Decides when waves are requested and when they start.
#[derive(Debug)]
pub struct WaveDirector {
    pub settings: DirectorSettings,
    phase: WavePhase,
    epoch: u32,
    next_seq: u64,
    pending: Option<Pending>,
    failures: u32,
    retry_at: Option<f64>,
    awaiting_manual_retry: bool,
    clock: f64,
    requests_sent: u64,
}

impl WaveDirector {
    pub fn new(settings: DirectorSettings) -> Self {
        Self {
            settings,
            phase: WavePhase::Idle,
            epoch: 0,
            next_seq: 0,
            pending: None,
            failures: 0,
            retry_at: None,
            awaiting_manual_retry: false,
            clock: 0.0,
            requests_sent: 0,
        }
    }

    pub fn phase(&self) -> WavePhase {
        self.phase
    }

    pub fn wave(&self) -> u32 {
        self.phase.wave()
    }

    /// A generation request is outstanding.
    pub fn in_flight(&self) -> bool {
        self.pending.is_some()
    }

    pub fn awaiting_manual_retry(&self) -> bool {
        self.awaiting_manual_retry
    }

    /// Total requests handed to the backend since construction.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Wave the next request is for, if one is due in this phase.
    fn next_wave(&self) -> Option<u32> {
        match self.phase {
            WavePhase::Idle => Some(1),
            WavePhase::Cleared { wave, .. } => Some(wave + 1),
            WavePhase::Active { .. } | WavePhase::GameOver { .. } => None,
        }
    }

    /// Request wave 1. Only valid from `Idle`.
    pub fn start(&mut self, backend: &mut dyn WaveBackend, context: &WaveContext, events: &mut Vec<GameEvent>) {
        if self.phase != WavePhase::Idle {
            return;
        }
        self.request(1, backend, context, events);
    }

    fn request(&mut self, wave: u32, backend: &mut dyn WaveBackend, context: &WaveContext, events: &mut Vec<GameEvent>) {
        if let Some(pending) = self.pending {
            log::debug!("Dropped request for wave {}: wave {} still in flight", wave, pending.ticket.wave);
            return;
        }
        // Wave 0 is the setup wave and never reaches a backend.
        if wave == 0 {
            return;
        }

        let ticket = Ticket {
            epoch: self.epoch,
            seq: self.next_seq,
            wave,
        };
        self.next_seq += 1;
        self.requests_sent += 1;
        self.retry_at = None;
        self.pending = Some(Pending {
            ticket,
            sent_at: self.clock,
        });
        backend.submit(ticket, WaveRequest::new(wave, context));
        log::debug!("Requested wave {} (seq {})", wave, ticket.seq);
        events.push(GameEvent::GenerationRequested { wave });
    }

    /// Advance the director. `alive` is the number of live zombies after
    /// this tick's combat. Returns a wave to spawn when one has arrived.
    pub fn update(
        &mut self,
        dt: f32,
        alive: usize,
        backend: &mut dyn WaveBackend,
        context: &WaveContext,
        events: &mut Vec<GameEvent>,
    ) -> Option<GeneratedWave> {
        self.clock += dt as f64;

        if let WavePhase::Active { wave } = self.phase {
            if alive == 0 {
                let resume_at = self.clock + self.settings.clear_delay as f64;
                self.phase = WavePhase::Cleared { wave, resume_at };
                log::info!("Wave {} cleared", wave);
                events.push(GameEvent::WaveCleared { wave });
            }
        }

        let arrived = self.drain_replies(backend, context, events);
        if arrived.is_some() {
            return arrived;
        }

        if let Some(pending) = self.pending {
            let waited = self.clock - pending.sent_at;
            if waited >= self.settings.generation_timeout as f64 {
                self.pending = None;
                backend.cancel(pending.ticket);
                let error = GenerationError::Timeout(self.settings.generation_timeout);
                self.fail(pending.ticket.wave, error, events);
            }
        }

        if self.pending.is_none() && !self.awaiting_manual_retry {
            if let Some(wave) = self.next_wave() {
                let due = match (self.retry_at, self.phase) {
                    (Some(at), _) => self.clock >= at,
                    (None, WavePhase::Cleared { resume_at, .. }) => self.failures == 0 && self.clock >= resume_at,
                    (None, _) => false,
                };
                if due {
                    self.request(wave, backend, context, events);
                }
            }
        }

        None
    }

    fn drain_replies(
        &mut self,
        backend: &mut dyn WaveBackend,
        context: &WaveContext,
        events: &mut Vec<GameEvent>,
    ) -> Option<GeneratedWave> {
        while let Some((ticket, reply)) = backend.poll() {
            let current = self.pending.map(|p| p.ticket);
            if current != Some(ticket) || matches!(self.phase, WavePhase::GameOver { .. }) {
                log::debug!("Discarded stale reply for wave {} (epoch {}, seq {})", ticket.wave, ticket.epoch, ticket.seq);
                continue;
            }
            self.pending = None;

            match reply.and_then(|response| response.into_wave()) {
                Ok(wave) if wave.is_empty() => {
                    log::warn!("Wave {} came back empty, requesting again", ticket.wave);
                    self.failures += 1;
                    if self.failures <= self.settings.max_retries {
                        self.request(ticket.wave, backend, context, events);
                    } else {
                        let error = GenerationError::Malformed("no zombies in wave".into());
                        self.fail(ticket.wave, error, events);
                    }
                }
                Ok(wave) => {
                    self.failures = 0;
                    self.retry_at = None;
                    self.phase = WavePhase::Active { wave: ticket.wave };
                    log::info!("Wave {} started with {} zombies", ticket.wave, wave.zombies.len());
                    events.push(GameEvent::WaveStarted {
                        wave: ticket.wave,
                        zombies: wave.zombies.len(),
                        message: wave.message.clone(),
                    });
                    return Some(wave);
                }
                Err(error) => self.fail(ticket.wave, error, events),
            }
        }
        None
    }

    /// Record a failed attempt. The phase is left as it was.
    fn fail(&mut self, wave: u32, error: GenerationError, events: &mut Vec<GameEvent>) {
        self.failures += 1;
        let will_retry = self.failures <= self.settings.max_retries;
        if will_retry {
            self.retry_at = Some(self.clock + self.settings.retry_delay as f64);
        } else {
            self.retry_at = None;
            self.awaiting_manual_retry = true;
        }
        log::warn!("Wave {} generation failed ({}); retry: {}", wave, error, will_retry);
        events.push(GameEvent::GenerationFailed {
            wave,
            error: error.to_string(),
            will_retry,
        });
    }

    /// Manually retry after automatic retries ran out. Returns false when
    /// there is nothing to retry.
    pub fn retry_wave(&mut self, backend: &mut dyn WaveBackend, context: &WaveContext, events: &mut Vec<GameEvent>) -> bool {
        if self.pending.is_some() || !(self.awaiting_manual_retry || self.retry_at.is_some()) {
            return false;
        }
        let Some(wave) = self.next_wave() else {
            return false;
        };
        self.failures = 0;
        self.awaiting_manual_retry = false;
        self.request(wave, backend, context, events);
        true
    }

    fn abandon(&mut self, backend: &mut dyn WaveBackend) {
        if let Some(pending) = self.pending.take() {
            backend.cancel(pending.ticket);
        }
    }

    /// Enter `GameOver`. Returns true only the first time.
    pub fn game_over(&mut self, backend: &mut dyn WaveBackend) -> bool {
        if matches!(self.phase, WavePhase::GameOver { .. }) {
            return false;
        }
        let wave = self.phase.wave();
        self.phase = WavePhase::GameOver { wave };
        self.abandon(backend);
        self.retry_at = None;
        self.awaiting_manual_retry = false;
        log::info!("Game over on wave {}", wave);
        true
    }

    /// Back to `Idle` for a new session. Replies to earlier requests become stale.
    pub fn reset(&mut self, backend: &mut dyn WaveBackend) {
        self.epoch = self.epoch.wrapping_add(1);
        self.phase = WavePhase::Idle;
        self.abandon(backend);
        self.failures = 0;
        self.retry_at = None;
        self.awaiting_manual_retry = false;
        self.clock = 0.0;
    }
}

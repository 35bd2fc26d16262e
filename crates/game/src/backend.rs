//! Wave generation backends.
//!
//! The director never blocks on generation. It hands a [`WaveRequest`] to a
//! [`WaveBackend`] together with a [`Ticket`] and polls for the answer on
//! later ticks. [`ProceduralBackend`] answers from `procgen::wave` on the next
//! poll; [`ServiceBackend`] runs a blocking [`WaveService`] on a worker
//! thread and parses the JSON it returns.

use std::collections::{HashSet, VecDeque};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use procgen::{generate_wave, Difficulty, GeneratedWave, WaveContext, ZombieDescriptor, ZombieKind};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest wave a service may return.
pub const MAX_WAVE_ZOMBIES: usize = 500;
/// How long a generator program may run before it is killed.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Walker stats the scaled schema multiplies.
const SCALED_BASE_HEALTH: f32 = 100.0;
const SCALED_BASE_SPEED: f32 = 0.03;

/// Identifies one generation request. The epoch changes on every session
/// reset so answers to an old session can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub epoch: u32,
    pub seq: u64,
    pub wave: u32,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("wave service unavailable: {0}")]
    Unavailable(String),
    #[error("malformed wave response: {0}")]
    Malformed(String),
    #[error("wave generation timed out after {0:.1}s")]
    Timeout(f32),
    #[error("wave backend disconnected")]
    Disconnected,
}

impl From<serde_json::Error> for GenerationError {
    fn from(e: serde_json::Error) -> Self {
        GenerationError::Malformed(e.to_string())
    }
}

/// Body sent to a generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveRequest {
    pub wave_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_score: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_survived: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_health: Option<f32>,
}

impl WaveRequest {
    pub fn new(wave_number: u32, context: &WaveContext) -> Self {
        Self {
            wave_number,
            difficulty: Some(context.difficulty),
            player_score: Some(context.player_score),
            time_survived: Some(context.time_survived),
            player_health: Some(context.player_health),
        }
    }

    pub fn context(&self) -> WaveContext {
        WaveContext {
            difficulty: self.difficulty.unwrap_or_default(),
            player_score: self.player_score.unwrap_or(0),
            time_survived: self.time_survived.unwrap_or(0.0),
            player_health: self.player_health.unwrap_or(100.0),
        }
    }
}

/// What a service answers. Both generations of the service schema are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WaveResponse {
    /// One entry per zombie.
    Roster {
        zombies: Vec<ZombieDescriptor>,
        #[serde(rename = "messageToPlayer", default)]
        message: String,
    },
    /// A head count and stat multipliers applied to walkers.
    Scaled {
        #[serde(rename = "zombieCount")]
        count: u32,
        #[serde(rename = "zombieSpeedMultiplier")]
        speed_multiplier: f32,
        #[serde(rename = "zombieHealthMultiplier")]
        health_multiplier: f32,
        #[serde(rename = "messageToPlayer", default)]
        message: String,
    },
}

impl WaveResponse {
    pub fn parse(text: &str) -> Result<Self, GenerationError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Normalise to a descriptor list, rejecting stats that cannot be played.
    pub fn into_wave(self) -> Result<GeneratedWave, GenerationError> {
        let (zombies, message) = match self {
            WaveResponse::Roster { zombies, message } => (zombies, message),
            WaveResponse::Scaled {
                count,
                speed_multiplier,
                health_multiplier,
                message,
            } => {
                let count = count as usize;
                if count > MAX_WAVE_ZOMBIES {
                    return Err(GenerationError::Malformed(format!("{} zombies requested", count)));
                }
                let walker = ZombieDescriptor {
                    kind: ZombieKind::Walker,
                    health: SCALED_BASE_HEALTH * health_multiplier,
                    speed: SCALED_BASE_SPEED * speed_multiplier,
                };
                (vec![walker; count], message)
            }
        };

        if zombies.len() > MAX_WAVE_ZOMBIES {
            return Err(GenerationError::Malformed(format!("{} zombies requested", zombies.len())));
        }
        for z in &zombies {
            let playable = |v: f32| v.is_finite() && v > 0.0;
            if !playable(z.health) || !playable(z.speed) {
                return Err(GenerationError::Malformed(format!(
                    "{} with health {} and speed {}",
                    z.kind.name(),
                    z.health,
                    z.speed
                )));
            }
        }
        Ok(GeneratedWave { zombies, message })
    }
}

impl From<GeneratedWave> for WaveResponse {
    fn from(wave: GeneratedWave) -> Self {
        WaveResponse::Roster {
            zombies: wave.zombies,
            message: wave.message,
        }
    }
}

pub type BackendReply = (Ticket, Result<WaveResponse, GenerationError>);

/// Non-blocking generation boundary polled once per tick.
pub trait WaveBackend {
    /// Queue a request. Must return without waiting for the answer.
    fn submit(&mut self, ticket: Ticket, request: WaveRequest);
    /// One finished reply, if any is ready.
    fn poll(&mut self) -> Option<BackendReply>;
    /// The caller gave up on `ticket`. Work for it may be skipped and its
    /// reply need not be delivered.
    fn cancel(&mut self, _ticket: Ticket) {}
}

/// Local generation with `procgen::wave`.
pub struct ProceduralBackend {
    rng: StdRng,
    ready: VecDeque<BackendReply>,
}

impl ProceduralBackend {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            ready: VecDeque::new(),
        }
    }
}

impl WaveBackend for ProceduralBackend {
    fn submit(&mut self, ticket: Ticket, request: WaveRequest) {
        let wave = generate_wave(request.wave_number, &request.context(), &mut self.rng);
        self.ready.push_back((ticket, Ok(wave.into())));
    }

    fn poll(&mut self) -> Option<BackendReply> {
        self.ready.pop_front()
    }
}

/// A blocking generator: takes the request JSON, returns the response JSON.
pub trait WaveService: Send + 'static {
    fn generate(&mut self, request_json: &str) -> Result<String, GenerationError>;
}

impl<F> WaveService for F
where
    F: FnMut(&str) -> Result<String, GenerationError> + Send + 'static,
{
    fn generate(&mut self, request_json: &str) -> Result<String, GenerationError> {
        self(request_json)
    }
}

/// Runs an external program per request: request JSON on stdin, response
/// JSON on stdout. A program still running after `timeout` is killed.
#[derive(Debug, Clone)]
pub struct CommandService {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandService {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Read a child pipe to the end on its own thread so a chatty child cannot
/// fill the pipe and stall.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf).ok();
        buf
    })
}

fn collect(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

impl WaveService for CommandService {
    fn generate(&mut self, request_json: &str) -> Result<String, GenerationError> {
        let unavailable = |e: std::io::Error| GenerationError::Unavailable(format!("{}: {}", self.program, e));

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(unavailable)?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(request_json.as_bytes()) {
                child.kill().ok();
                child.wait().ok();
                return Err(unavailable(e));
            }
        }
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait().map_err(unavailable)? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    log::warn!("{} still running after {:?}, killing it", self.program, self.timeout);
                    child.kill().ok();
                    child.wait().ok();
                    return Err(GenerationError::Timeout(self.timeout.as_secs_f32()));
                }
                None => thread::sleep(COMMAND_POLL_INTERVAL),
            }
        };

        let stdout = collect(stdout);
        if !status.success() {
            let stderr = collect(stderr);
            return Err(GenerationError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        String::from_utf8(stdout).map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

/// Drives a [`WaveService`] on a worker thread.
pub struct ServiceBackend {
    jobs: Option<Sender<(Ticket, String)>>,
    results: Receiver<BackendReply>,
    /// Failures detected on the calling side, reported on the next poll.
    local: VecDeque<BackendReply>,
    outstanding: Vec<Ticket>,
    /// Cancelled tickets the worker has not reached yet.
    abandoned: Arc<Mutex<HashSet<Ticket>>>,
}

/// Remove `ticket` from the abandoned set, reporting whether it was there.
fn take_abandoned(abandoned: &Mutex<HashSet<Ticket>>, ticket: Ticket) -> bool {
    abandoned.lock().map(|mut set| set.remove(&ticket)).unwrap_or(false)
}

impl ServiceBackend {
    pub fn spawn<S: WaveService>(mut service: S) -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<(Ticket, String)>();
        let (result_tx, result_rx) = mpsc::channel::<BackendReply>();
        let abandoned = Arc::new(Mutex::new(HashSet::new()));
        let skipped = Arc::clone(&abandoned);

        thread::Builder::new().name("wave-service".into()).spawn(move || {
            for (ticket, body) in job_rx {
                if take_abandoned(&skipped, ticket) {
                    log::debug!("Skipped abandoned request for wave {} (seq {})", ticket.wave, ticket.seq);
                    continue;
                }
                let reply = service.generate(&body).and_then(|text| WaveResponse::parse(&text));
                // Cancelled while it ran.
                take_abandoned(&skipped, ticket);
                if result_tx.send((ticket, reply)).is_err() {
                    break;
                }
            }
            log::debug!("Wave service worker stopped");
        })?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            local: VecDeque::new(),
            outstanding: Vec::new(),
            abandoned,
        })
    }
}

impl WaveBackend for ServiceBackend {
    fn submit(&mut self, ticket: Ticket, request: WaveRequest) {
        let body = match serde_json::to_string(&request) {
            Ok(body) => body,
            Err(e) => {
                self.local.push_back((ticket, Err(e.into())));
                return;
            }
        };
        let sent = self.jobs.as_ref().map_or(false, |jobs| jobs.send((ticket, body)).is_ok());
        if sent {
            self.outstanding.push(ticket);
        } else {
            self.jobs = None;
            self.local.push_back((ticket, Err(GenerationError::Disconnected)));
        }
    }

    fn poll(&mut self) -> Option<BackendReply> {
        if let Some(reply) = self.local.pop_front() {
            return Some(reply);
        }
        loop {
            match self.results.try_recv() {
                Ok(reply) => {
                    let owed = self.outstanding.len();
                    self.outstanding.retain(|t| *t != reply.0);
                    if self.outstanding.len() == owed {
                        // Cancelled after the worker had started on it.
                        continue;
                    }
                    return Some(reply);
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    // Worker is gone: fail whatever it still owed us.
                    let ticket = self.outstanding.pop()?;
                    log::warn!("Wave service worker exited with a request pending");
                    self.jobs = None;
                    return Some((ticket, Err(GenerationError::Disconnected)));
                }
            }
        }
    }

    fn cancel(&mut self, ticket: Ticket) {
        let owed = self.outstanding.len();
        self.outstanding.retain(|t| *t != ticket);
        if self.outstanding.len() == owed {
            return;
        }
        if let Ok(mut set) = self.abandoned.lock() {
            set.insert(ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn ticket(seq: u64, wave: u32) -> Ticket {
        Ticket { epoch: 0, seq, wave }
    }

    fn wait_for(backend: &mut dyn WaveBackend) -> BackendReply {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(reply) = backend.poll() {
                return reply;
            }
            assert!(Instant::now() < deadline, "no reply from backend");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn request_uses_camel_case() {
        let ctx = WaveContext { difficulty: Difficulty::Hard, player_score: 1200, time_survived: 61.5, player_health: 40.0 };
        let json = serde_json::to_value(WaveRequest::new(4, &ctx)).unwrap();
        assert_eq!(json["waveNumber"], 4);
        assert_eq!(json["difficulty"], "hard");
        assert_eq!(json["playerScore"], 1200);
        assert_eq!(json["timeSurvived"], 61.5);
        assert_eq!(json["playerHealth"], 40.0);
    }

    #[test]
    fn roster_schema_keeps_kinds() {
        let text = r#"{"zombies":[{"type":"clicker","health":45,"speed":0.04},{"type":"runner","health":22,"speed":0.06}],"messageToPlayer":"Wave 2: Listen..."}"#;
        let wave = WaveResponse::parse(text).unwrap().into_wave().unwrap();
        assert_eq!(wave.zombies.len(), 2);
        assert_eq!(wave.zombies[0].kind, ZombieKind::Clicker);
        assert_eq!(wave.zombies[1].health, 22.0);
        assert_eq!(wave.message, "Wave 2: Listen...");
    }

    #[test]
    fn scaled_schema_becomes_walkers() {
        let text = r#"{"zombieCount":5,"zombieSpeedMultiplier":1.5,"zombieHealthMultiplier":2.0,"messageToPlayer":"Faster now"}"#;
        let wave = WaveResponse::parse(text).unwrap().into_wave().unwrap();
        assert_eq!(wave.zombies.len(), 5);
        for z in &wave.zombies {
            assert_eq!(z.kind, ZombieKind::Walker);
            assert_eq!(z.health, 200.0);
            assert!((z.speed - 0.045).abs() < 1e-6);
        }
    }

    #[test]
    fn unplayable_responses_are_malformed() {
        let cases = [
            r#"{"zombies":[{"type":"walker","health":-3,"speed":0.03}]}"#,
            r#"{"zombies":[{"type":"walker","health":30,"speed":0}]}"#,
            r#"{"zombieCount":9000,"zombieSpeedMultiplier":1,"zombieHealthMultiplier":1}"#,
            r#"{"zombies":[{"type":"ghoul","health":30,"speed":0.03}]}"#,
            r#"here come the zombies"#,
        ];
        for text in cases {
            let result = WaveResponse::parse(text).and_then(WaveResponse::into_wave);
            assert!(matches!(result, Err(GenerationError::Malformed(_))), "{text}");
        }
    }

    #[test]
    fn procedural_answers_on_next_poll() {
        let mut backend = ProceduralBackend::new(Some(5));
        assert!(backend.poll().is_none());

        backend.submit(ticket(1, 0), WaveRequest::new(0, &WaveContext::default()));
        backend.submit(ticket(2, 1), WaveRequest::new(1, &WaveContext::default()));

        let (t0, setup) = backend.poll().unwrap();
        assert_eq!(t0.seq, 1);
        assert!(setup.unwrap().into_wave().unwrap().is_empty());

        let (t1, first) = backend.poll().unwrap();
        assert_eq!(t1.seq, 2);
        assert!(first.unwrap().into_wave().unwrap().zombies.len() >= 12);
    }

    #[test]
    fn service_replies_come_back_through_the_worker() {
        let service = |body: &str| -> Result<String, GenerationError> {
            let request: WaveRequest = serde_json::from_str(body).map_err(GenerationError::from)?;
            Ok(format!(
                r#"{{"zombieCount":{},"zombieSpeedMultiplier":1.0,"zombieHealthMultiplier":1.0,"messageToPlayer":"Wave {}"}}"#,
                request.wave_number * 2,
                request.wave_number
            ))
        };
        let mut backend = ServiceBackend::spawn(service).unwrap();
        backend.submit(ticket(7, 3), WaveRequest::new(3, &WaveContext::default()));

        let (t, reply) = wait_for(&mut backend);
        assert_eq!(t, ticket(7, 3));
        let wave = reply.unwrap().into_wave().unwrap();
        assert_eq!(wave.zombies.len(), 6);
        assert_eq!(wave.message, "Wave 3");
    }

    #[test]
    fn service_errors_are_reported_not_raised() {
        let service = |_: &str| -> Result<String, GenerationError> {
            Err(GenerationError::Unavailable("connection refused".into()))
        };
        let mut backend = ServiceBackend::spawn(service).unwrap();
        backend.submit(ticket(1, 1), WaveRequest::new(1, &WaveContext::default()));
        let (_, reply) = wait_for(&mut backend);
        assert_eq!(reply, Err(GenerationError::Unavailable("connection refused".into())));
    }

    #[test]
    fn abandoned_requests_are_skipped_by_the_worker() {
        let (release, hold) = mpsc::channel::<()>();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let service = move |body: &str| -> Result<String, GenerationError> {
            // The first call hangs until the test lets it go.
            if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                hold.recv().ok();
            }
            let request: WaveRequest = serde_json::from_str(body)?;
            Ok(format!(
                r#"{{"zombieCount":{},"zombieSpeedMultiplier":1.0,"zombieHealthMultiplier":1.0}}"#,
                request.wave_number + 1
            ))
        };
        let mut backend = ServiceBackend::spawn(service).unwrap();

        backend.submit(ticket(1, 1), WaveRequest::new(1, &WaveContext::default()));
        let deadline = Instant::now() + Duration::from_secs(5);
        while calls.load(std::sync::atomic::Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline, "worker never started");
            thread::sleep(Duration::from_millis(1));
        }

        // Timed out twice while the first call hung.
        backend.submit(ticket(2, 1), WaveRequest::new(1, &WaveContext::default()));
        backend.submit(ticket(3, 1), WaveRequest::new(1, &WaveContext::default()));
        backend.cancel(ticket(1, 1));
        backend.cancel(ticket(2, 1));
        release.send(()).unwrap();

        let (t, reply) = wait_for(&mut backend);
        assert_eq!(t, ticket(3, 1));
        assert_eq!(reply.unwrap().into_wave().unwrap().zombies.len(), 2);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert!(backend.poll().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn hung_program_is_killed_at_the_deadline() {
        let mut service =
            CommandService::new("sleep", vec!["5".into()]).with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let result = service.generate("{}");
        assert!(matches!(result, Err(GenerationError::Timeout(_))), "{result:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn program_output_is_the_response() {
        let mut service = CommandService::new("cat", Vec::new());
        let body = r#"{"zombieCount":3,"zombieSpeedMultiplier":1.0,"zombieHealthMultiplier":1.0}"#;
        assert_eq!(service.generate(body).unwrap(), body);
    }

    #[test]
    fn missing_program_is_unavailable() {
        let mut service = CommandService::new("definitely-not-a-wave-generator-binary", Vec::new());
        let result = service.generate("{}");
        assert!(matches!(result, Err(GenerationError::Unavailable(_))));
    }
}

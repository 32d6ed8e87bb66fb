//! Macro playback
//!
//! Replays events at their recorded offsets, once, N times, or for a fixed
//! duration. Waits are cut into short slices and the session's stop flag is
//! polled between them, so the kill switch or [`Player::stop`] takes effect
//! within one slice.

use crate::events::{sort_events, Event, EventData};
use crate::platform::{keymap, HookGuard, InputCallback, InputCapture, InputEvent, InputInjector, Key};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_REPEAT: u32 = 2;
pub const DEFAULT_LOOP_SECONDS: f64 = 10.0;
/// Longest uninterrupted sleep while waiting for the next event
pub const WAIT_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayMode {
    /// One pass
    #[default]
    Once,
    /// `repeat_count` passes
    Repeat,
    /// Passes until `loop_seconds` have elapsed
    Loop,
}

impl FromStr for PlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "repeat" => Ok(Self::Repeat),
            "loop" => Ok(Self::Loop),
            other => Err(format!("unknown play mode '{}' (expected once, repeat or loop)", other)),
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Once => "once",
            Self::Repeat => "repeat",
            Self::Loop => "loop",
        })
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub mode: PlayMode,
    pub repeat_count: u32,
    pub loop_seconds: f64,
    /// Playback rate (1.0 = recorded timing, 2.0 = twice as fast)
    pub speed: f64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            mode: PlayMode::Once,
            repeat_count: DEFAULT_REPEAT,
            loop_seconds: DEFAULT_LOOP_SECONDS,
            speed: 1.0,
        }
    }
}

impl PlaybackOptions {
    pub fn once() -> Self {
        Self::default()
    }

    pub fn repeat(count: u32) -> Self {
        Self {
            mode: PlayMode::Repeat,
            repeat_count: count,
            ..Self::default()
        }
    }

    pub fn looping(seconds: f64) -> Self {
        Self {
            mode: PlayMode::Loop,
            loop_seconds: seconds,
            ..Self::default()
        }
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    fn rate(&self) -> f64 {
        if self.speed.is_finite() && self.speed > 0.0 {
            self.speed
        } else {
            1.0
        }
    }
}

/// Parse a repeat count, falling back to [`DEFAULT_REPEAT`] when the text is
/// not a positive integer.
pub fn parse_repeat_count(s: &str) -> u32 {
    match s.trim().parse::<i64>() {
        Ok(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => DEFAULT_REPEAT,
    }
}

/// Parse a loop duration in seconds, falling back to
/// [`DEFAULT_LOOP_SECONDS`] when the text is not a positive number.
pub fn parse_loop_seconds(s: &str) -> f64 {
    match s.trim().parse::<f64>() {
        Ok(f) if f.is_finite() && f > 0.0 => f,
        _ => DEFAULT_LOOP_SECONDS,
    }
}

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub wait_slice: Duration,
    /// Pressing this key during playback cancels it
    pub kill_key: Key,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            wait_slice: WAIT_SLICE,
            kill_key: Key::Escape,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    pub clicks: usize,
    pub moves: usize,
    pub scrolls: usize,
    pub keys: usize,
    /// Unresolvable labels and failed injections
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
    /// Another playback was already running
    Rejected,
}

#[derive(Debug, Clone)]
pub struct PlaybackReport {
    pub outcome: PlaybackOutcome,
    /// Passes started
    pub passes: u32,
    pub stats: ReplayStats,
    pub elapsed: Duration,
}

impl PlaybackReport {
    fn rejected() -> Self {
        Self {
            outcome: PlaybackOutcome::Rejected,
            passes: 0,
            stats: ReplayStats::default(),
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Default)]
struct State {
    playing: AtomicBool,
    /// Stop flag of the running session
    current: Mutex<Option<Arc<AtomicBool>>>,
}

/// One playback session. Dropping it disarms the kill switch and returns the
/// player to idle, whichever way the session ends.
struct Session {
    state: Arc<State>,
    stop: Arc<AtomicBool>,
    kill_switch: Arc<Mutex<Option<HookGuard>>>,
}

impl Session {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.kill_switch.lock().take();
        self.stop.store(true, Ordering::SeqCst);
        *self.state.current.lock() = None;
        self.state.playing.store(false, Ordering::SeqCst);
    }
}

/// Background playback started by [`Player::spawn`]
pub struct PlaybackHandle {
    finished: Receiver<PlaybackReport>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PlaybackHandle {
    /// Completion channel, for use with `crossbeam_channel::select!`
    pub fn finished(&self) -> &Receiver<PlaybackReport> {
        &self.finished
    }

    pub fn try_report(&self) -> Option<PlaybackReport> {
        self.finished.try_recv().ok()
    }

    /// Block until playback ends. `None` if the playback thread panicked.
    pub fn wait(mut self) -> Option<PlaybackReport> {
        let report = self.finished.recv().ok();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
        report
    }
}

/// Replays event lists through an [`InputInjector`]
#[derive(Clone)]
pub struct Player {
    injector: Arc<dyn InputInjector>,
    capture: Arc<dyn InputCapture>,
    config: PlayerConfig,
    state: Arc<State>,
}

impl Player {
    /// `capture` is only used for the kill switch.
    pub fn new(injector: Arc<dyn InputInjector>, capture: Arc<dyn InputCapture>) -> Self {
        Self::with_config(injector, capture, PlayerConfig::default())
    }

    pub fn with_config(
        injector: Arc<dyn InputInjector>,
        capture: Arc<dyn InputCapture>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            injector,
            capture,
            config,
            state: Arc::new(State::default()),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::SeqCst)
    }

    /// Request cancellation of the running playback. No-op when idle.
    pub fn stop(&self) {
        if let Some(flag) = self.state.current.lock().as_ref() {
            flag.store(true, Ordering::SeqCst);
            tracing::info!("playback stop requested");
        }
    }

    /// Play on the calling thread until done or cancelled.
    pub fn play(&self, events: &[Event], options: &PlaybackOptions) -> PlaybackReport {
        match self.begin() {
            Some(session) => self.run(session, events, options),
            None => PlaybackReport::rejected(),
        }
    }

    /// Play on a background thread. `None` if a playback is already running.
    pub fn spawn(&self, events: Vec<Event>, options: PlaybackOptions) -> Option<PlaybackHandle> {
        let session = self.begin()?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        let player = self.clone();

        let spawned = thread::Builder::new()
            .name("macromaker-playback".into())
            .spawn(move || {
                let report = player.run(session, &events, &options);
                let _ = tx.send(report);
            });

        match spawned {
            Ok(thread) => Some(PlaybackHandle {
                finished: rx,
                thread: Some(thread),
            }),
            Err(e) => {
                tracing::error!(error = %e, "could not spawn playback thread");
                None
            }
        }
    }

    fn begin(&self) -> Option<Session> {
        if self
            .state
            .playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("already playing, ignoring play request");
            return None;
        }

        let stop = Arc::new(AtomicBool::new(false));
        *self.state.current.lock() = Some(stop.clone());
        let kill_switch = self.arm_kill_switch(stop.clone());

        Some(Session {
            state: self.state.clone(),
            stop,
            kill_switch,
        })
    }

    /// One-shot hook: the first press of the kill key sets the stop flag and
    /// releases the hook.
    fn arm_kill_switch(&self, stop: Arc<AtomicBool>) -> Arc<Mutex<Option<HookGuard>>> {
        let slot: Arc<Mutex<Option<HookGuard>>> = Arc::new(Mutex::new(None));
        let kill_key = self.config.kill_key;
        let own_slot = slot.clone();

        let callback: InputCallback = Arc::new(move |input| {
            if let InputEvent::Key { key, pressed: true } = input {
                if key == kill_key {
                    stop.store(true, Ordering::SeqCst);
                    tracing::info!(?key, "kill switch pressed");
                    own_slot.lock().take();
                }
            }
        });

        match self.capture.subscribe(callback) {
            Ok(guard) => *slot.lock() = Some(guard),
            Err(e) => tracing::warn!(error = %e, "kill switch unavailable, playback can only be stopped externally"),
        }
        slot
    }

    fn run(&self, session: Session, events: &[Event], options: &PlaybackOptions) -> PlaybackReport {
        let started = Instant::now();
        let mut events = events.to_vec();
        sort_events(&mut events);

        let rate = options.rate();
        let mut stats = ReplayStats::default();
        let mut passes = 0;

        tracing::info!(mode = %options.mode, events = events.len(), speed = rate, "playback started");

        if !events.is_empty() {
            match options.mode {
                PlayMode::Once => {
                    passes = 1;
                    self.play_pass(&session, &events, rate, &mut stats);
                }
                PlayMode::Repeat => {
                    for _ in 0..options.repeat_count.max(1) {
                        if session.stopped() {
                            break;
                        }
                        passes += 1;
                        self.play_pass(&session, &events, rate, &mut stats);
                    }
                }
                PlayMode::Loop => {
                    // Unrepresentable durations loop until stopped
                    let deadline = Duration::try_from_secs_f64(options.loop_seconds.max(0.0))
                        .ok()
                        .and_then(|d| started.checked_add(d));
                    while deadline.map_or(true, |d| Instant::now() < d) && !session.stopped() {
                        passes += 1;
                        self.play_pass(&session, &events, rate, &mut stats);
                    }
                }
            }
        }

        let outcome = if session.stopped() {
            PlaybackOutcome::Cancelled
        } else {
            PlaybackOutcome::Completed
        };
        drop(session);

        let elapsed = started.elapsed();
        tracing::info!(?outcome, passes, ?stats, ?elapsed, "playback finished");
        PlaybackReport {
            outcome,
            passes,
            stats,
            elapsed,
        }
    }

    /// One traversal, timed from its own start.
    fn play_pass(&self, session: &Session, events: &[Event], rate: f64, stats: &mut ReplayStats) {
        let pass_start = Instant::now();
        for event in events {
            if session.stopped() {
                return;
            }
            let target = Duration::try_from_secs_f64((event.t / rate).max(0.0))
                .ok()
                .and_then(|offset| pass_start.checked_add(offset));
            if !self.wait_until(session, target) {
                return;
            }
            self.dispatch(event, stats);
        }
    }

    /// Sleep in slices until `target`. False if stopped first; `None` waits
    /// for a stop.
    fn wait_until(&self, session: &Session, target: Option<Instant>) -> bool {
        loop {
            if session.stopped() {
                return false;
            }
            let remaining = match target {
                Some(t) => t.saturating_duration_since(Instant::now()),
                None => self.config.wait_slice,
            };
            if remaining.is_zero() {
                return true;
            }
            thread::sleep(remaining.min(self.config.wait_slice));
        }
    }

    fn dispatch(&self, event: &Event, stats: &mut ReplayStats) {
        let injector = &self.injector;
        let injected = match &event.data {
            EventData::MouseClick {
                x,
                y,
                button,
                pressed,
            } => {
                let Some(b) = keymap::decode_button(button) else {
                    tracing::debug!(label = %button, t = event.t, "unresolvable button, skipping");
                    stats.skipped += 1;
                    return;
                };
                injector
                    .move_to(*x, *y)
                    .and_then(|_| injector.button(b, *pressed))
                    .map(|_| stats.clicks += 1)
            }
            EventData::MouseMove { x, y } => injector.move_to(*x, *y).map(|_| stats.moves += 1),
            EventData::MouseScroll { x, y, dx, dy } => injector
                .move_to(*x, *y)
                .and_then(|_| injector.scroll(*dx, *dy))
                .map(|_| stats.scrolls += 1),
            EventData::KeyAction { action, key } => {
                let Some(k) = keymap::decode_key(key) else {
                    tracing::debug!(label = %key, t = event.t, "unresolvable key, skipping");
                    stats.skipped += 1;
                    return;
                };
                injector.key(k, action.is_press()).map(|_| stats.keys += 1)
            }
        };

        if let Err(e) = injected {
            tracing::warn!(error = %e, t = event.t, kind = event.kind(), "injection failed, skipping");
            stats.skipped += 1;
        }
    }
}

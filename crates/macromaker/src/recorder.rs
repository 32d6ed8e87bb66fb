//! Event recorder
//!
//! Subscribes to the global input hook and turns raw callbacks into a
//! timestamped, coalesced event log. Callbacks only ever append under one
//! short lock, so hook threads never wait on anything slow.

use crate::error::Result;
use crate::events::{sort_events, Event, EventData, KeyAction};
use crate::platform::{keymap, HookGuard, InputCallback, InputCapture, InputEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Moves closer together in time than this...
pub const MOVE_MIN_INTERVAL: Duration = Duration::from_millis(20);
/// ...and closer in space than this (|dx| + |dy|, pixels) are dropped
pub const MOVE_MIN_DISTANCE: i32 = 3;

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Record pointer moves (coalesced); clicks always carry their position
    pub capture_moves: bool,
    pub move_min_interval: Duration,
    pub move_min_distance: i32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capture_moves: true,
            move_min_interval: MOVE_MIN_INTERVAL,
            move_min_distance: MOVE_MIN_DISTANCE,
        }
    }
}

#[derive(Default)]
struct Buffer {
    /// Session currently accepting appends
    active: Option<u64>,
    next_session: u64,
    events: Vec<Event>,
    last_move: Option<(f64, i32, i32)>,
}

impl Buffer {
    fn begin(&mut self) -> u64 {
        let session = self.next_session;
        self.next_session += 1;
        self.active = Some(session);
        self.events.clear();
        self.last_move = None;
        session
    }

    fn append(&mut self, session: u64, event: Event, config: &RecorderConfig) {
        // Late callbacks from a stopped or replaced session
        if self.active != Some(session) {
            return;
        }
        if let EventData::MouseMove { x, y } = event.data {
            if !self.accept_move(event.t, x, y, config) {
                return;
            }
        }
        self.events.push(event);
    }

    fn accept_move(&mut self, t: f64, x: i32, y: i32, config: &RecorderConfig) -> bool {
        if let Some((last_t, last_x, last_y)) = self.last_move {
            let too_soon = t - last_t < config.move_min_interval.as_secs_f64();
            let too_close = (x - last_x).abs() + (y - last_y).abs() < config.move_min_distance;
            if too_soon && too_close {
                return false;
            }
        }
        self.last_move = Some((t, x, y));
        true
    }
}

/// Records global mouse and keyboard input into an event list
pub struct MacroRecorder {
    capture: Arc<dyn InputCapture>,
    config: RecorderConfig,
    buffer: Arc<Mutex<Buffer>>,
    hook: Mutex<Option<HookGuard>>,
}

impl MacroRecorder {
    pub fn new(capture: Arc<dyn InputCapture>) -> Self {
        Self::with_config(capture, RecorderConfig::default())
    }

    pub fn with_config(capture: Arc<dyn InputCapture>, config: RecorderConfig) -> Self {
        Self {
            capture,
            config,
            buffer: Arc::new(Mutex::new(Buffer::default())),
            hook: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Start a new session, discarding the previous events.
    ///
    /// No-op while already recording.
    pub fn start(&self) -> Result<()> {
        let mut hook = self.hook.lock();
        if hook.is_some() {
            return Ok(());
        }

        let start = Instant::now();
        let session = self.buffer.lock().begin();

        let buffer = self.buffer.clone();
        let config = self.config.clone();
        let callback: InputCallback = Arc::new(move |input| {
            // Stamp before anything can delay us
            let t = start.elapsed().as_secs_f64();
            if let Some(event) = to_event(t, input, &config) {
                buffer.lock().append(session, event, &config);
            }
        });

        match self.capture.subscribe(callback) {
            Ok(guard) => *hook = Some(guard),
            Err(e) => {
                self.buffer.lock().active = None;
                return Err(e);
            }
        }

        tracing::info!(session, capture_moves = self.config.capture_moves, "recording started");
        Ok(())
    }

    /// Stop the session. No-op when not recording.
    pub fn stop(&self) {
        let Some(guard) = self.hook.lock().take() else {
            return;
        };
        let count = {
            let mut buf = self.buffer.lock();
            buf.active = None;
            buf.events.len()
        };
        guard.release();
        tracing::info!(events = count, "recording stopped");
    }

    pub fn is_recording(&self) -> bool {
        self.hook.lock().is_some()
    }

    /// Snapshot of the recorded events, sorted by `t`
    pub fn events(&self) -> Vec<Event> {
        let mut events = self.buffer.lock().events.clone();
        sort_events(&mut events);
        events
    }

    pub fn event_count(&self) -> usize {
        self.buffer.lock().events.len()
    }
}

fn to_event(t: f64, input: InputEvent, config: &RecorderConfig) -> Option<Event> {
    let event = match input {
        InputEvent::MouseMove { x, y } => {
            if !config.capture_moves {
                return None;
            }
            Event::moved(t, x as i32, y as i32)
        }
        InputEvent::Button {
            x,
            y,
            button,
            pressed,
        } => Event::click(t, x as i32, y as i32, keymap::encode_button(button), pressed),
        InputEvent::Wheel { x, y, dx, dy } => {
            Event::scroll(t, x as i32, y as i32, saturate(dx), saturate(dy))
        }
        InputEvent::Key { key, pressed } => {
            Event::key(t, KeyAction::from_pressed(pressed), keymap::encode_key(key))
        }
    };
    Some(event)
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Button, HookRegistry, Key};

    fn recorder(config: RecorderConfig) -> (HookRegistry, MacroRecorder) {
        let registry = HookRegistry::new();
        let recorder = MacroRecorder::with_config(Arc::new(registry.clone()), config);
        (registry, recorder)
    }

    fn moves(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e.data, EventData::MouseMove { .. }))
            .count()
    }

    #[test]
    fn coalesces_small_quick_moves() {
        let config = RecorderConfig::default();
        let mut buf = Buffer::default();
        let s = buf.begin();

        buf.append(s, Event::moved(0.100, 100, 100), &config);
        buf.append(s, Event::moved(0.105, 101, 100), &config);
        assert_eq!(moves(&buf.events), 1);

        buf.append(s, Event::moved(0.110, 111, 100), &config);
        assert_eq!(moves(&buf.events), 2);

        // far enough apart in time, however small
        buf.append(s, Event::moved(0.140, 112, 100), &config);
        assert_eq!(moves(&buf.events), 3);
    }

    #[test]
    fn never_coalesces_clicks_or_keys() {
        let config = RecorderConfig::default();
        let mut buf = Buffer::default();
        let s = buf.begin();
        for i in 0..4 {
            buf.append(s, Event::click(0.001 * i as f64, 5, 5, "Button.left", i % 2 == 0), &config);
            buf.append(s, Event::key(0.001 * i as f64, KeyAction::Press, "a"), &config);
        }
        assert_eq!(buf.events.len(), 8);
    }

    #[test]
    fn records_hook_events_with_labels() {
        let (registry, recorder) = recorder(RecorderConfig::default());
        recorder.start().unwrap();
        assert!(recorder.is_recording());

        registry.dispatch(InputEvent::MouseMove { x: 10.0, y: 10.0 });
        registry.dispatch(InputEvent::MouseMove { x: 11.0, y: 10.0 });
        registry.dispatch(InputEvent::MouseMove { x: 30.0, y: 10.0 });
        registry.dispatch(InputEvent::Button {
            x: 30.0,
            y: 10.0,
            button: Button::Left,
            pressed: true,
        });
        registry.dispatch(InputEvent::Wheel {
            x: 30.0,
            y: 10.0,
            dx: 0,
            dy: -1,
        });
        registry.dispatch(InputEvent::Key {
            key: Key::Escape,
            pressed: false,
        });
        recorder.stop();

        let events = recorder.events();
        assert_eq!(moves(&events), 2);
        assert_eq!(events.len(), 5);
        assert!(events.windows(2).all(|w| w[0].t <= w[1].t));
        assert_eq!(
            events[2].data,
            EventData::MouseClick {
                x: 30,
                y: 10,
                button: "Button.left".into(),
                pressed: true,
            }
        );
        assert_eq!(
            events[4].data,
            EventData::KeyAction {
                action: KeyAction::Release,
                key: "Key.esc".into(),
            }
        );
    }

    #[test]
    fn move_capture_can_be_disabled() {
        let (registry, recorder) = recorder(RecorderConfig {
            capture_moves: false,
            ..Default::default()
        });
        recorder.start().unwrap();
        registry.dispatch(InputEvent::MouseMove { x: 1.0, y: 1.0 });
        registry.dispatch(InputEvent::Key {
            key: Key::KeyA,
            pressed: true,
        });
        recorder.stop();

        assert_eq!(recorder.events().len(), 1);
    }

    #[test]
    fn stop_unsubscribes_and_freezes_buffer() {
        let (registry, recorder) = recorder(RecorderConfig::default());
        recorder.start().unwrap();
        assert_eq!(registry.len(), 1);
        recorder.stop();
        assert!(registry.is_empty());
        assert!(!recorder.is_recording());

        registry.dispatch(InputEvent::Key {
            key: Key::KeyA,
            pressed: true,
        });
        assert_eq!(recorder.event_count(), 0);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (registry, recorder) = recorder(RecorderConfig::default());
        recorder.stop();
        assert!(!recorder.is_recording());

        recorder.start().unwrap();
        registry.dispatch(InputEvent::Key {
            key: Key::KeyA,
            pressed: true,
        });
        recorder.start().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(recorder.event_count(), 1);

        recorder.stop();
        recorder.stop();
        assert_eq!(recorder.event_count(), 1);
    }

    #[test]
    fn new_session_discards_previous_events() {
        let (registry, recorder) = recorder(RecorderConfig::default());
        recorder.start().unwrap();
        registry.dispatch(InputEvent::Key {
            key: Key::KeyA,
            pressed: true,
        });
        recorder.stop();

        recorder.start().unwrap();
        assert_eq!(recorder.event_count(), 0);
        recorder.stop();
    }

    #[test]
    fn concurrent_hook_threads_all_land() {
        let (registry, recorder) = recorder(RecorderConfig {
            capture_moves: false,
            ..Default::default()
        });
        recorder.start().unwrap();

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        registry.dispatch(InputEvent::Key {
                            key: Key::KeyB,
                            pressed: true,
                        });
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        recorder.stop();

        let events = recorder.events();
        assert_eq!(events.len(), 200);
        assert!(events.windows(2).all(|w| w[0].t <= w[1].t));
    }
}

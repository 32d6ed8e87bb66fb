//! Test doubles

use crate::error::Result;
use crate::platform::{Button, InputInjector, Key};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Injected {
    Move(i32, i32),
    Button(Button, bool),
    Scroll(i32, i32),
    Key(Key, bool),
}

/// Remembers every injected action with its offset from creation
pub(crate) struct RecordingInjector {
    created: Instant,
    log: Mutex<Vec<(Duration, Injected)>>,
}

impl RecordingInjector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            created: Instant::now(),
            log: Mutex::new(Vec::new()),
        })
    }

    fn push(&self, action: Injected) -> Result<()> {
        self.log.lock().push((self.created.elapsed(), action));
        Ok(())
    }

    pub(crate) fn log(&self) -> Vec<(Duration, Injected)> {
        self.log.lock().clone()
    }

    pub(crate) fn actions(&self) -> Vec<Injected> {
        self.log.lock().iter().map(|(_, a)| a.clone()).collect()
    }
}

impl InputInjector for RecordingInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        self.push(Injected::Move(x, y))
    }

    fn button(&self, button: Button, pressed: bool) -> Result<()> {
        self.push(Injected::Button(button, pressed))
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<()> {
        self.push(Injected::Scroll(dx, dy))
    }

    fn key(&self, key: Key, pressed: bool) -> Result<()> {
        self.push(Injected::Key(key, pressed))
    }
}

//! Input injection backends

use super::{Button, InputInjector, Key};
use crate::error::{Error, Result};
use rdev::EventType;
use std::time::Duration;

/// Synthesizes input through `rdev::simulate`
#[derive(Debug, Clone)]
pub struct RdevInjector {
    settle: Duration,
}

impl RdevInjector {
    pub fn new() -> Self {
        // macOS drops synthetic events posted back-to-back
        let settle = if cfg!(target_os = "macos") {
            Duration::from_millis(5)
        } else {
            Duration::ZERO
        };
        Self { settle }
    }

    /// Pause after each synthesized event
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn send(&self, event: EventType) -> Result<()> {
        rdev::simulate(&event).map_err(|_| Error::Injection(format!("{:?}", event)))?;
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
        Ok(())
    }
}

impl Default for RdevInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl InputInjector for RdevInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        self.send(EventType::MouseMove {
            x: x as f64,
            y: y as f64,
        })
    }

    fn button(&self, button: Button, pressed: bool) -> Result<()> {
        self.send(if pressed {
            EventType::ButtonPress(button)
        } else {
            EventType::ButtonRelease(button)
        })
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<()> {
        self.send(EventType::Wheel {
            delta_x: dx as i64,
            delta_y: dy as i64,
        })
    }

    fn key(&self, key: Key, pressed: bool) -> Result<()> {
        self.send(if pressed {
            EventType::KeyPress(key)
        } else {
            EventType::KeyRelease(key)
        })
    }
}

/// Logs instead of injecting; used for dry runs
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInjector;

impl InputInjector for NoopInjector {
    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        tracing::debug!(x, y, "dry-run move");
        Ok(())
    }

    fn button(&self, button: Button, pressed: bool) -> Result<()> {
        tracing::debug!(?button, pressed, "dry-run button");
        Ok(())
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<()> {
        tracing::debug!(dx, dy, "dry-run scroll");
        Ok(())
    }

    fn key(&self, key: Key, pressed: bool) -> Result<()> {
        tracing::debug!(?key, pressed, "dry-run key");
        Ok(())
    }
}

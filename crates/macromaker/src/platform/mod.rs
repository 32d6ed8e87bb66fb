//! Platform abstraction layer for capture and replay
//!
//! The recorder and player only depend on [`InputCapture`] and
//! [`InputInjector`]. The `rdev` backend implements both for macOS, Linux
//! (X11) and Windows; [`HookRegistry`] is the in-process fan-out both the
//! backend and tests feed.
//!
//! Key and button identity uses `rdev`'s platform-neutral enums. Converting
//! them to and from the on-disk labels happens only in [`keymap`].

mod hooks;
mod inject;
pub mod keymap;

pub use hooks::{run_with_input_hook, HookGuard, HookRegistry, InputCallback, RdevCapture};
pub use inject::{NoopInjector, RdevInjector};
pub use rdev::{Button, Key};

use crate::error::Result;

/// Raw input as delivered by an OS hook
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    MouseMove { x: f64, y: f64 },
    /// Button press/release at the last known pointer position
    Button {
        x: f64,
        y: f64,
        button: Button,
        pressed: bool,
    },
    /// Wheel delta at the last known pointer position
    Wheel { x: f64, y: f64, dx: i64, dy: i64 },
    Key { key: Key, pressed: bool },
}

/// Subscribe to global pointer, wheel and keyboard notifications.
///
/// The subscription lasts as long as the returned [`HookGuard`]. Callbacks run
/// on threads the caller does not own and must not block.
pub trait InputCapture: Send + Sync {
    fn subscribe(&self, callback: InputCallback) -> Result<HookGuard>;
}

/// Synthesize pointer, wheel and keyboard input.
pub trait InputInjector: Send + Sync {
    fn move_to(&self, x: i32, y: i32) -> Result<()>;
    fn button(&self, button: Button, pressed: bool) -> Result<()>;
    fn scroll(&self, dx: i32, dy: i32) -> Result<()>;
    fn key(&self, key: Key, pressed: bool) -> Result<()>;
}

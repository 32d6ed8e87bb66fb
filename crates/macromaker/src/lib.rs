//! macromaker - Record and replay mouse and keyboard macros
//!
//! Captures global input into a timestamped event log, stores it as JSON and
//! replays it at the recorded timing, once, N times or for a fixed duration.
//! Pressing ESC during playback cancels it.
//!
//! On macOS the OS hook must own the main thread: programs using
//! [`platform::RdevCapture`] wrap their work in
//! [`platform::run_with_input_hook`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use macromaker::prelude::*;
//! use std::sync::Arc;
//!
//! let recorder = MacroRecorder::new(Arc::new(RdevCapture::new()));
//! recorder.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! recorder.stop();
//!
//! let store = MacroStore::new()?;
//! let path = store.save("demo", &recorder.events())?;
//!
//! let player = Player::new(Arc::new(RdevInjector::new()), Arc::new(RdevCapture::new()));
//! let report = player.play(&load_macro(&path)?, &PlaybackOptions::repeat(3));
//! println!("{:?}", report.outcome);
//! # Ok::<(), macromaker::Error>(())
//! ```

pub mod error;
pub mod events;
pub mod platform;
pub mod recorder;
pub mod replay;
pub mod storage;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use events::*;
pub use recorder::{MacroRecorder, RecorderConfig};
pub use replay::{
    parse_loop_seconds, parse_repeat_count, PlayMode, PlaybackHandle, PlaybackOptions,
    PlaybackOutcome, PlaybackReport, Player, PlayerConfig, ReplayStats,
};
pub use storage::{load_macro, read_macro, save_macro, MacroStore};

pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::events::*;
    pub use crate::platform::{
        run_with_input_hook, InputCapture, InputInjector, NoopInjector, RdevCapture,
        RdevInjector,
    };
    pub use crate::recorder::{MacroRecorder, RecorderConfig};
    pub use crate::replay::{
        PlayMode, PlaybackHandle, PlaybackOptions, PlaybackOutcome, PlaybackReport, Player,
        PlayerConfig, ReplayStats,
    };
    pub use crate::storage::{load_macro, read_macro, save_macro, MacroStore};
}

//! Global input hook hub
//!
//! `rdev::listen` blocks its thread for the life of the process and can only
//! be installed once, so a single listener thread feeds a [`HookRegistry`] and
//! every consumer holds a scoped [`HookGuard`] subscription instead.
//!
//! On macOS the hook must run on the main thread (rdev resolves key names
//! through the keyboard layout APIs inside its callback), so programs wrap
//! their work in [`run_with_input_hook`], which parks the main thread in the
//! listener. Elsewhere the first subscription spawns a listener thread.

use super::{InputCapture, InputEvent};
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::{Arc, Once, OnceLock, Weak};
use std::thread;
use std::time::Duration;

pub type InputCallback = Arc<dyn Fn(InputEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, InputCallback)>,
}

/// Fan-out of raw input to the current subscribers
#[derive(Clone, Default)]
pub struct HookRegistry {
    inner: Arc<Mutex<Subscribers>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: InputCallback) -> HookGuard {
        let mut subs = self.inner.lock();
        let id = subs.next_id;
        subs.next_id += 1;
        subs.entries.push((id, callback));
        HookGuard {
            registry: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Deliver one event to every subscriber.
    ///
    /// Callbacks run outside the registry lock, so a callback may drop its own
    /// guard. A subscriber released while a dispatch is in flight can still
    /// see that one event.
    pub fn dispatch(&self, event: InputEvent) {
        let callbacks: Vec<InputCallback> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InputCapture for HookRegistry {
    fn subscribe(&self, callback: InputCallback) -> Result<HookGuard> {
        Ok(HookRegistry::subscribe(self, callback))
    }
}

/// Scoped hook subscription; dropping it unsubscribes.
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct HookGuard {
    registry: Weak<Mutex<Subscribers>>,
    id: u64,
}

impl HookGuard {
    /// Unsubscribe now. Same as dropping the guard.
    pub fn release(self) {}
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            let id = self.id;
            inner.lock().entries.retain(|(entry, _)| *entry != id);
        }
    }
}

impl std::fmt::Debug for HookGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookGuard").field("id", &self.id).finish()
    }
}

// ============================================================================
// rdev backend
// ============================================================================

/// How long the first subscription waits for the OS hook to fail on startup
pub const STARTUP_GRACE: Duration = Duration::from_millis(100);

struct Hub {
    registry: HookRegistry,
    started: Once,
    failure: Mutex<Option<String>>,
    /// Startup failure report, claimed by the first subscriber
    startup: Mutex<Option<Receiver<String>>>,
}

static HUB: OnceLock<Hub> = OnceLock::new();

fn hub() -> &'static Hub {
    HUB.get_or_init(|| Hub {
        registry: HookRegistry::new(),
        started: Once::new(),
        failure: Mutex::new(None),
        startup: Mutex::new(None),
    })
}

/// Process-wide OS hook backed by `rdev::listen`.
///
/// The listener is started once per process and never stopped; subscriptions
/// come and go through the shared registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct RdevCapture;

impl RdevCapture {
    pub fn new() -> Self {
        Self
    }
}

impl InputCapture for RdevCapture {
    fn subscribe(&self, callback: InputCallback) -> Result<HookGuard> {
        let hub = hub();
        hub.started.call_once(|| start_background(hub));

        let startup = hub.startup.lock().take();
        if let Some(rx) = startup {
            await_startup(&rx, STARTUP_GRACE)?;
        }
        if let Some(reason) = hub.failure.lock().clone() {
            return Err(Error::Hook(reason));
        }
        Ok(hub.registry.subscribe(callback))
    }
}

/// Run `app` with the global input hook available, then exit the process
/// with the code it returns.
///
/// On macOS the calling thread (which must be the main thread) becomes the
/// hook thread and `app` runs on a worker. Elsewhere `app` runs in place.
pub fn run_with_input_hook<F>(app: F) -> !
where
    F: FnOnce() -> i32 + Send + 'static,
{
    #[cfg(target_os = "macos")]
    {
        let hub = hub();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut claimed = None;
        hub.started.call_once(|| {
            *hub.startup.lock() = Some(rx);
            claimed = Some(tx);
        });
        let Some(tx) = claimed else {
            std::process::exit(app());
        };

        let worker = thread::Builder::new()
            .name("macromaker-app".into())
            .spawn(move || std::process::exit(app()));
        if let Err(e) = worker {
            tracing::error!(error = %e, "could not spawn app thread");
            std::process::exit(1);
        }
        listen(hub, tx);
        // Hook failed; the app thread still decides the exit code
        loop {
            thread::park();
        }
    }

    #[cfg(not(target_os = "macos"))]
    std::process::exit(app())
}

fn start_background(hub: &'static Hub) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    *hub.startup.lock() = Some(rx);

    if cfg!(target_os = "macos") {
        let reason = "the macOS input hook must run on the main thread (use run_with_input_hook)";
        tracing::error!("{}", reason);
        *hub.failure.lock() = Some(reason.to_string());
        return;
    }

    let spawned = thread::Builder::new()
        .name("macromaker-hook".into())
        .spawn(move || listen(hub, tx));

    if let Err(e) = spawned {
        tracing::error!(error = %e, "could not spawn input hook thread");
        *hub.failure.lock() = Some(e.to_string());
    }
}

/// Block in `rdev::listen` feeding the hub. Returns only if the hook fails.
fn listen(hub: &'static Hub, failed: Sender<String>) {
    let registry = hub.registry.clone();
    let mut translator = Translator::new(cursor_position);

    tracing::debug!(pointer = ?translator.pointer, "global input hook starting");
    let result = rdev::listen(move |event: rdev::Event| {
        registry.dispatch(translator.translate(event.event_type));
    });

    if let Err(e) = result {
        let reason = format!("{:?}", e);
        tracing::error!(error = %reason, "global input hook failed");
        *hub.failure.lock() = Some(reason.clone());
        let _ = failed.try_send(reason);
    }
}

/// Wait up to `grace` for a startup failure. Silence means the hook is up.
fn await_startup(rx: &Receiver<String>, grace: Duration) -> Result<()> {
    match rx.recv_timeout(grace) {
        Ok(reason) => Err(Error::Hook(reason)),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(()),
    }
}

/// Current pointer position, queried from a short-lived helper thread.
fn cursor_position() -> Option<(f64, f64)> {
    use enigo::{Enigo, Mouse, Settings};

    thread::spawn(|| {
        Enigo::new(&Settings::default())
            .ok()
            .and_then(|enigo| enigo.location().ok())
    })
    .join()
    .ok()
    .flatten()
    .map(|(x, y)| (f64::from(x), f64::from(y)))
}

/// Turns rdev events into [`InputEvent`]s, attaching the pointer position to
/// button and wheel events (rdev only reports it on moves).
struct Translator<L> {
    pointer: Option<(f64, f64)>,
    locate: L,
    /// The lookup after a failed seed happens at most once
    retried: bool,
}

impl<L: FnMut() -> Option<(f64, f64)>> Translator<L> {
    /// Seeds the position from `locate`, so input before the first move
    /// still lands where the pointer actually is.
    fn new(mut locate: L) -> Self {
        let pointer = locate();
        Self {
            pointer,
            locate,
            retried: false,
        }
    }

    fn position(&mut self) -> (f64, f64) {
        if self.pointer.is_none() && !self.retried {
            self.retried = true;
            self.pointer = (self.locate)();
        }
        self.pointer.unwrap_or_else(|| {
            tracing::debug!("pointer position unknown, using origin");
            (0.0, 0.0)
        })
    }

    fn translate(&mut self, event: rdev::EventType) -> InputEvent {
        match event {
            rdev::EventType::MouseMove { x, y } => {
                self.pointer = Some((x, y));
                InputEvent::MouseMove { x, y }
            }
            rdev::EventType::ButtonPress(button) => {
                let (x, y) = self.position();
                InputEvent::Button {
                    x,
                    y,
                    button,
                    pressed: true,
                }
            }
            rdev::EventType::ButtonRelease(button) => {
                let (x, y) = self.position();
                InputEvent::Button {
                    x,
                    y,
                    button,
                    pressed: false,
                }
            }
            rdev::EventType::Wheel { delta_x, delta_y } => {
                let (x, y) = self.position();
                InputEvent::Wheel {
                    x,
                    y,
                    dx: delta_x,
                    dy: delta_y,
                }
            }
            rdev::EventType::KeyPress(key) => InputEvent::Key { key, pressed: true },
            rdev::EventType::KeyRelease(key) => InputEvent::Key { key, pressed: false },
        }
    }
}

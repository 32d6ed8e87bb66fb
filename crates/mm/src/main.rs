//! mm - macromaker CLI
//!
//! Record global mouse and keyboard input into named macros and play them
//! back. Press ESC during playback to stop it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use macromaker::prelude::*;
use macromaker::platform::{keymap, Key};
use macromaker::{parse_loop_seconds, parse_repeat_count};

#[derive(Parser)]
#[command(name = "mm")]
#[command(about = "macromaker - record and replay mouse and keyboard macros")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record input until Ctrl+C (the stop chord itself is not saved)
    Record {
        #[arg(short, long, default_value = "macro")]
        name: String,
        /// Write to this file instead of the macro directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Do not record pointer moves
        #[arg(long)]
        no_moves: bool,
    },
    /// Play a macro (name or path)
    Play {
        file: String,
        #[arg(short, long, default_value = "once")]
        mode: PlayMode,
        /// Passes in repeat mode
        #[arg(long, default_value = "2")]
        repeat: String,
        /// Duration of loop mode
        #[arg(long, default_value = "10")]
        loop_seconds: String,
        #[arg(short, long, default_value = "1.0")]
        speed: f64,
        /// Seconds to wait before the first event
        #[arg(long, default_value = "2")]
        delay: u64,
        /// Log events instead of injecting them
        #[arg(long)]
        dry_run: bool,
    },
    /// List saved macros
    List,
    /// Show macro info
    Show {
        file: String,
        #[arg(long)]
        all: bool,
    },
    /// Delete a macro
    Delete {
        file: String,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        // Hook users; on macOS the hook takes the main thread
        command @ (Commands::Record { .. } | Commands::Play { .. }) => {
            run_with_input_hook(move || exit_code(run(command)))
        }
        command => std::process::exit(exit_code(run(command))),
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Record { name, output, no_moves } => record(&name, output, !no_moves),
        Commands::Play {
            file,
            mode,
            repeat,
            loop_seconds,
            speed,
            delay,
            dry_run,
        } => {
            let options = PlaybackOptions {
                mode,
                repeat_count: parse_repeat_count(&repeat),
                loop_seconds: parse_loop_seconds(&loop_seconds),
                speed,
            };
            play(&file, &options, delay, dry_run)
        }
        Commands::List => list(),
        Commands::Show { file, all } => show(&file, all),
        Commands::Delete { file } => delete(&file),
    }
}

fn exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "macromaker=info,mm=info".into()),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn record(name: &str, output: Option<PathBuf>, capture_moves: bool) -> Result<()> {
    let config = RecorderConfig {
        capture_moves,
        ..Default::default()
    };
    let recorder = MacroRecorder::with_config(Arc::new(RdevCapture::new()), config);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    recorder.start().context("could not start recording")?;
    println!("Recording: {} (Ctrl+C to stop)", name);

    let mut count = 0;
    while running.load(Ordering::SeqCst) {
        let now = recorder.event_count();
        if now != count {
            count = now;
            print!("\r{} events", count);
            io::stdout().flush()?;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    recorder.stop();

    let mut events = recorder.events();
    trim_stop_chord(&mut events);
    println!("\n{} events recorded", events.len());
    if events.is_empty() {
        tracing::warn!("nothing was recorded");
    }

    let path = match output {
        Some(path) => {
            save_macro(&events, &path)?;
            path
        }
        None => MacroStore::new()?.save(name, &events)?,
    };
    println!("Saved: {}", path.display());
    Ok(())
}

fn play(file: &str, options: &PlaybackOptions, delay: u64, dry_run: bool) -> Result<()> {
    let store = MacroStore::new()?;
    let path = store.resolve(file);
    let events = load_macro(&path).with_context(|| format!("could not load {}", path.display()))?;
    if events.is_empty() {
        println!("No valid events in {}, nothing to play.", path.display());
        return Ok(());
    }

    let injector: Arc<dyn InputInjector> = if dry_run {
        Arc::new(NoopInjector)
    } else {
        Arc::new(RdevInjector::new())
    };
    let player = Player::new(injector, Arc::new(RdevCapture::new()));

    let stopper = player.clone();
    ctrlc::set_handler(move || stopper.stop())?;

    match options.mode {
        PlayMode::Once => println!("Playing {} ({} events)", file, events.len()),
        PlayMode::Repeat => println!(
            "Playing {} ({} events) {} times",
            file,
            events.len(),
            options.repeat_count
        ),
        PlayMode::Loop => println!(
            "Playing {} ({} events) for {}s",
            file,
            events.len(),
            options.loop_seconds
        ),
    }
    if delay > 0 {
        println!("Starting in {} seconds...", delay);
        std::thread::sleep(Duration::from_secs(delay));
    }
    println!("Press ESC to stop");

    let handle = player
        .spawn(events, options.clone())
        .context("a playback is already running")?;
    let report = handle.wait().context("playback thread died")?;

    let stats = &report.stats;
    match report.outcome {
        PlaybackOutcome::Completed => print!("Done!"),
        PlaybackOutcome::Cancelled => print!("Stopped."),
        PlaybackOutcome::Rejected => print!("Rejected."),
    }
    println!(
        " {} passes in {:.1}s: {} clicks, {} moves, {} scrolls, {} keys, {} skipped",
        report.passes,
        report.elapsed.as_secs_f64(),
        stats.clicks,
        stats.moves,
        stats.scrolls,
        stats.keys,
        stats.skipped
    );
    Ok(())
}

fn list() -> Result<()> {
    let store = MacroStore::new()?;
    let files = store.list()?;
    if files.is_empty() {
        println!("No macros saved in {}.", store.path().display());
    } else {
        for f in files {
            println!("{}", f);
        }
    }
    Ok(())
}

fn show(file: &str, all: bool) -> Result<()> {
    let store = MacroStore::new()?;
    let doc = store.read(file)?;
    println!("File: {}", store.resolve(file).display());
    println!("Version: {}", doc.version);
    println!("Created: {}", doc.created);
    println!("Events: {}", doc.events.len());
    if let Some(last) = doc.events.last() {
        println!("Duration: {:.2}s", last.t);
    }

    let (mut clicks, mut moves, mut scrolls, mut keys) = (0, 0, 0, 0);
    for e in &doc.events {
        match &e.data {
            EventData::MouseClick { .. } => clicks += 1,
            EventData::MouseMove { .. } => moves += 1,
            EventData::MouseScroll { .. } => scrolls += 1,
            EventData::KeyAction { .. } => keys += 1,
        }
    }
    println!(
        "\nSummary: {} clicks, {} moves, {} scrolls, {} keys",
        clicks, moves, scrolls, keys
    );
    if all {
        for (i, e) in doc.events.iter().enumerate() {
            println!("{}: {:.3} {:?}", i, e.t, e.data);
        }
    }
    Ok(())
}

fn delete(file: &str) -> Result<()> {
    let store = MacroStore::new()?;
    store.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}

/// Drop the trailing Ctrl+C that stopped the recording, so playing the macro
/// does not interrupt whatever has focus. Only releases and moves may follow
/// the chord.
fn trim_stop_chord(events: &mut Vec<Event>) {
    let key_is = |e: &Event, pressed: bool, wanted: &[Key]| match &e.data {
        EventData::KeyAction { action, key } => {
            action.is_press() == pressed
                && keymap::decode_key(key).is_some_and(|k| wanted.contains(&k))
        }
        _ => false,
    };
    const CTRL: &[Key] = &[Key::ControlLeft, Key::ControlRight];

    let Some(c_at) = events.iter().rposition(|e| key_is(e, true, &[Key::KeyC])) else {
        return;
    };
    let only_releases_after = events[c_at + 1..].iter().all(|e| match &e.data {
        EventData::KeyAction { action, .. } => !action.is_press(),
        EventData::MouseClick { pressed, .. } => !pressed,
        EventData::MouseMove { .. } => true,
        EventData::MouseScroll { .. } => false,
    });
    if !only_releases_after {
        return;
    }

    // Ctrl must still be held when `c` went down
    let ctrl = events[..c_at]
        .iter()
        .rposition(|e| key_is(e, true, CTRL) || key_is(e, false, CTRL));
    if let Some(at) = ctrl.filter(|&at| key_is(&events[at], true, CTRL)) {
        events.truncate(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(t: f64, label: &str, pressed: bool) -> Event {
        Event::key(t, KeyAction::from_pressed(pressed), label)
    }

    #[test]
    fn trims_trailing_ctrl_c() {
        let mut events = vec![
            key(0.1, "a", true),
            key(0.2, "a", false),
            key(1.0, "Key.ctrl_l", true),
            key(1.1, "c", true),
            key(1.2, "c", false),
        ];
        trim_stop_chord(&mut events);
        assert_eq!(events, vec![key(0.1, "a", true), key(0.2, "a", false)]);
    }

    #[test]
    fn keeps_ctrl_c_followed_by_more_input() {
        let mut events = vec![
            key(0.1, "Key.ctrl_r", true),
            key(0.2, "c", true),
            key(0.3, "c", false),
            key(0.4, "Key.ctrl_r", false),
            key(0.5, "v", true),
        ];
        let before = events.clone();
        trim_stop_chord(&mut events);
        assert_eq!(events, before);
    }

    #[test]
    fn keeps_plain_c_without_ctrl() {
        let mut events = vec![
            key(0.1, "Key.ctrl_l", true),
            key(0.2, "Key.ctrl_l", false),
            key(0.3, "c", true),
        ];
        let before = events.clone();
        trim_stop_chord(&mut events);
        assert_eq!(events, before);
    }
}

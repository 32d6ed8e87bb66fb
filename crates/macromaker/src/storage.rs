//! Macro storage - versioned JSON documents
//!
//! Loading is strict about the document and lenient about its contents:
//! unreadable or malformed files are errors, while individual events that
//! fail validation are dropped.

use crate::error::{Error, Result};
use crate::events::{sort_events, Event, KeyAction, Macro, MACRO_VERSION};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Write `events` as a version 1 macro, creating parent directories.
pub fn save_macro(events: &[Event], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let doc = Macro::new(events.to_vec());
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, &doc).map_err(|e| Error::io(path, e.into()))?;
    w.flush().map_err(|e| Error::io(path, e))?;

    tracing::info!(path = %path.display(), events = events.len(), "macro saved");
    Ok(())
}

/// Load and validate the events of a macro file, sorted by `t`.
pub fn load_macro(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    read_macro(path).map(|m| m.events)
}

/// Load a macro file keeping its metadata.
pub fn read_macro(path: impl AsRef<Path>) -> Result<Macro> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let doc: Value = serde_json::from_str(&text).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;

    let Value::Object(doc) = doc else {
        return Err(Error::Format {
            path: path.to_path_buf(),
            reason: "top level must be a JSON object".into(),
        });
    };

    let version = check_version(path, doc.get("version"))?;
    let created = doc
        .get("created")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let events = validate_events(doc.get("events"));

    tracing::debug!(path = %path.display(), events = events.len(), "macro loaded");
    Ok(Macro {
        version,
        created,
        events,
    })
}

fn check_version(path: &Path, raw: Option<&Value>) -> Result<u32> {
    match raw {
        // Hand-written files without a version are read as version 1
        None => Ok(MACRO_VERSION),
        Some(v) if v.as_f64() == Some(f64::from(MACRO_VERSION)) => Ok(MACRO_VERSION),
        Some(v) => Err(Error::UnsupportedVersion {
            path: path.to_path_buf(),
            version: v.to_string(),
        }),
    }
}

/// Validate raw events, dropping anything malformed, and sort by `t`.
pub fn validate_events(raw: Option<&Value>) -> Vec<Event> {
    let Some(Value::Array(items)) = raw else {
        return Vec::new();
    };

    let mut events: Vec<Event> = items
        .iter()
        .filter_map(|item| {
            let event = item.as_object().and_then(validate_event);
            if event.is_none() {
                tracing::debug!(%item, "dropping invalid event");
            }
            event
        })
        .collect();
    sort_events(&mut events);
    events
}

fn validate_event(raw: &Map<String, Value>) -> Option<Event> {
    let t = coerce_float(raw.get("t")?).filter(|t| *t >= 0.0)?;
    let int = |field: &str| raw.get(field).and_then(coerce_int);

    match raw.get("type")?.as_str()? {
        "mouse_click" => {
            let button = label(raw.get("button")?)?;
            let pressed = coerce_pressed(raw.get("pressed")?)?;
            Some(Event::click(t, int("x")?, int("y")?, button, pressed))
        }
        "mouse_move" => Some(Event::moved(t, int("x")?, int("y")?)),
        "mouse_scroll" => Some(Event::scroll(t, int("x")?, int("y")?, int("dx")?, int("dy")?)),
        "key" => {
            let key = label(raw.get("key")?)?;
            let action = KeyAction::parse(raw.get("action")?.as_str()?)?;
            Some(Event::key(t, action, key))
        }
        _ => None,
    }
}

fn coerce_float(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    f.is_finite().then_some(f)
}

fn coerce_int(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i32::try_from(i).ok(),
            None => {
                let f = n.as_f64()?.trunc();
                (f.is_finite() && f >= i32::MIN as f64 && f <= i32::MAX as f64).then(|| f as i32)
            }
        },
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i32::from(*b)),
        _ => None,
    }
}

fn coerce_pressed(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64()? {
            f if f == 0.0 => Some(false),
            f if f == 1.0 => Some(true),
            _ => None,
        },
        _ => None,
    }
}

fn label(v: &Value) -> Option<String> {
    v.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

// ============================================================================
// Macro directory
// ============================================================================

/// A directory of named macro files
pub struct MacroStore {
    dir: PathBuf,
}

impl MacroStore {
    /// `$MACROMAKER_HOME`, or `~/.macromaker/macros`
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os("MACROMAKER_HOME") {
            Some(home) => PathBuf::from(home),
            None => {
                let home = std::env::var_os("HOME")
                    .or_else(|| std::env::var_os("USERPROFILE"))
                    .ok_or(Error::NoHome)?;
                PathBuf::from(home).join(".macromaker").join("macros")
            }
        };
        Self::with_dir(dir)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Resolve a macro name to its file. Existing paths are used as-is.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let given = Path::new(name);
        if given.components().count() > 1 || given.is_file() {
            return given.to_path_buf();
        }
        self.dir.join(file_name(name))
    }

    pub fn save(&self, name: &str, events: &[Event]) -> Result<PathBuf> {
        let path = self.dir.join(file_name(name));
        save_macro(events, &path)?;
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<Vec<Event>> {
        load_macro(self.resolve(name))
    }

    pub fn read(&self, name: &str) -> Result<Macro> {
        read_macro(self.resolve(name))
    }

    /// File names of all stored macros, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))? {
            let entry = entry.map_err(|e| Error::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                if let Some(s) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.resolve(name);
        fs::remove_file(&path).map_err(|e| Error::io(&path, e))
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

fn file_name(name: &str) -> String {
    let stem = name.strip_suffix(".json").unwrap_or(name);
    format!("{}.{}", sanitize(stem), EXTENSION)
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, doc: Value) -> PathBuf {
        let path = dir.join("macro.json");
        fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
        path
    }

    #[test]
    fn round_trip_sorts_by_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("m.json");
        let events = vec![
            Event::key(0.9, KeyAction::Release, "a"),
            Event::click(0.1, 10, 20, "Button.left", true),
            Event::scroll(0.5, 10, 20, 0, -2),
            Event::moved(0.3, 11, 21),
            Event::key(0.7, KeyAction::Press, "Key.shift"),
        ];

        save_macro(&events, &path).unwrap();
        let loaded = load_macro(&path).unwrap();

        let mut expected = events.clone();
        sort_events(&mut expected);
        assert_eq!(loaded, expected);
    }

    #[test]
    fn writes_versioned_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        save_macro(&[Event::moved(0.0, 1, 2)], &path).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["version"], 1);
        assert!(doc["created"].as_str().unwrap().contains('T'));
        assert_eq!(doc["events"][0]["type"], "mouse_move");
    }

    #[test]
    fn drops_invalid_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            json!({
                "version": 1,
                "events": [
                    {"t": -1.0, "type": "key", "action": "press", "key": "a"},
                    {"t": "soon", "type": "key", "action": "press", "key": "a"},
                    {"t": 0.1, "type": "key", "action": "tap", "key": "a"},
                    {"t": 0.1, "type": "key", "action": "press", "key": ""},
                    {"t": 0.1, "type": "mouse_click", "x": 1, "y": 2, "button": "Button.left", "pressed": 2},
                    {"t": 0.1, "type": "mouse_scroll", "x": 1, "y": 2, "dx": "up", "dy": 0},
                    {"t": 0.1, "type": "teleport"},
                    "not an object"
                ]
            }),
        );

        assert!(load_macro(&path).unwrap().is_empty());
    }

    #[test]
    fn coerces_lenient_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            json!({
                "version": 1,
                "events": [
                    {"t": "0.25", "type": "mouse_click", "x": "5", "y": 6.9, "button": "Button.right", "pressed": 0},
                    {"t": 0, "type": "mouse_scroll", "x": 1, "y": 2, "dx": true, "dy": -3}
                ]
            }),
        );

        let events = load_macro(&path).unwrap();
        assert_eq!(
            events,
            vec![
                Event::scroll(0.0, 1, 2, 1, -3),
                Event::click(0.25, 5, 6, "Button.right", false),
            ]
        );
    }

    #[test]
    fn out_of_order_file_loads_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            json!({
                "version": 1,
                "events": [
                    {"t": 3.0, "type": "key", "action": "press", "key": "c"},
                    {"t": 1.0, "type": "key", "action": "press", "key": "a"},
                    {"t": 2.0, "type": "key", "action": "press", "key": "b"}
                ]
            }),
        );

        let ts: Vec<f64> = load_macro(&path).unwrap().iter().map(|e| e.t).collect();
        assert_eq!(ts, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn non_array_events_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), json!({"version": 1, "events": {"t": 1}}));
        assert!(load_macro(&path).unwrap().is_empty());

        let path = write(dir.path(), json!({"version": 1}));
        assert!(load_macro(&path).unwrap().is_empty());
    }

    #[test]
    fn structural_failures_are_errors() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"events\": [").unwrap();
        assert!(matches!(load_macro(&path), Err(Error::Parse { .. })));

        let path = write(dir.path(), json!([1, 2, 3]));
        assert!(matches!(load_macro(&path), Err(Error::Format { .. })));

        assert!(matches!(
            load_macro(dir.path().join("missing.json")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), json!({"version": 2, "events": []}));
        assert!(matches!(
            load_macro(&path),
            Err(Error::UnsupportedVersion { .. })
        ));

        let path = write(dir.path(), json!({"events": []}));
        assert_eq!(read_macro(&path).unwrap().version, MACRO_VERSION);
    }

    #[test]
    fn float_version_one_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), json!({"version": 1.0, "events": []}));
        assert_eq!(read_macro(&path).unwrap().version, MACRO_VERSION);

        let path = write(dir.path(), json!({"version": 1.5, "events": []}));
        assert!(matches!(
            read_macro(&path),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn store_names_are_ascii_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::with_dir(dir.path()).unwrap();
        let path = store.save("café über-1", &[]).unwrap();
        assert_eq!(path.file_name().unwrap(), "caf___ber-1.json");
    }

    #[test]
    fn store_saves_lists_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::with_dir(dir.path()).unwrap();

        let path = store.save("my macro", &[Event::moved(0.0, 1, 1)]).unwrap();
        assert_eq!(path.file_name().unwrap(), "my_macro.json");
        assert_eq!(store.list().unwrap(), vec!["my_macro.json".to_string()]);
        assert_eq!(store.load("my_macro").unwrap().len(), 1);

        store.delete("my_macro.json").unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}

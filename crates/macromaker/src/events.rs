//! Recorded input events
//!
//! Events serialize to flat JSON objects tagged by `type`, with the timestamp
//! `t` in seconds since the recording started.

use serde::{Deserialize, Serialize};

/// Schema version written by [`crate::storage::save_macro`]
pub const MACRO_VERSION: u32 = 1;

/// `created` timestamp format: local time, second precision
pub const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A persisted macro - metadata plus the event list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub version: u32,
    pub created: String,
    pub events: Vec<Event>,
}

impl Macro {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            version: MACRO_VERSION,
            created: chrono::Local::now().format(CREATED_FORMAT).to_string(),
            events,
        }
    }
}

/// Single event - timestamp plus flattened payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since recording start (monotonic clock)
    pub t: f64,
    /// Event type and data
    #[serde(flatten)]
    pub data: EventData,
}

/// Event payload, tagged by `type` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventData {
    /// Mouse button pressed or released at (x, y)
    MouseClick {
        x: i32,
        y: i32,
        button: String,
        pressed: bool,
    },

    /// Pointer moved to (x, y)
    MouseMove { x: i32, y: i32 },

    /// Wheel scrolled by (dx, dy) with the pointer at (x, y)
    MouseScroll { x: i32, y: i32, dx: i32, dy: i32 },

    /// Key pressed or released
    #[serde(rename = "key")]
    KeyAction { action: KeyAction, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Press,
    Release,
}

impl KeyAction {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            Self::Press
        } else {
            Self::Release
        }
    }

    pub fn is_press(self) -> bool {
        self == Self::Press
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Release => "release",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "press" => Some(Self::Press),
            "release" => Some(Self::Release),
            _ => None,
        }
    }
}

impl Event {
    pub fn click(t: f64, x: i32, y: i32, button: impl Into<String>, pressed: bool) -> Self {
        Self {
            t,
            data: EventData::MouseClick {
                x,
                y,
                button: button.into(),
                pressed,
            },
        }
    }

    pub fn moved(t: f64, x: i32, y: i32) -> Self {
        Self {
            t,
            data: EventData::MouseMove { x, y },
        }
    }

    pub fn scroll(t: f64, x: i32, y: i32, dx: i32, dy: i32) -> Self {
        Self {
            t,
            data: EventData::MouseScroll { x, y, dx, dy },
        }
    }

    pub fn key(t: f64, action: KeyAction, key: impl Into<String>) -> Self {
        Self {
            t,
            data: EventData::KeyAction {
                action,
                key: key.into(),
            },
        }
    }

    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self.data {
            EventData::MouseClick { .. } => "mouse_click",
            EventData::MouseMove { .. } => "mouse_move",
            EventData::MouseScroll { .. } => "mouse_scroll",
            EventData::KeyAction { .. } => "key",
        }
    }
}

/// Stable sort by `t`; events with equal timestamps keep their input order.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| a.t.total_cmp(&b.t));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_flat_with_type_tag() {
        let e = Event::click(1.25, 10, 20, "Button.left", true);
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["t"], 1.25);
        assert_eq!(v["type"], "mouse_click");
        assert_eq!(v["button"], "Button.left");
        assert_eq!(v["pressed"], true);

        let k = serde_json::to_value(Event::key(0.5, KeyAction::Release, "a")).unwrap();
        assert_eq!(k["type"], "key");
        assert_eq!(k["action"], "release");
    }

    #[test]
    fn sort_is_stable_on_ties() {
        let mut events = vec![
            Event::key(0.2, KeyAction::Press, "b"),
            Event::key(0.1, KeyAction::Press, "a"),
            Event::key(0.2, KeyAction::Release, "b"),
        ];
        sort_events(&mut events);
        assert_eq!(events[0].t, 0.1);
        assert_eq!(
            events[1].data,
            EventData::KeyAction { action: KeyAction::Press, key: "b".into() }
        );
        assert_eq!(
            events[2].data,
            EventData::KeyAction { action: KeyAction::Release, key: "b".into() }
        );
    }

    #[test]
    fn macro_carries_current_version() {
        let m = Macro::new(Vec::new());
        assert_eq!(m.version, MACRO_VERSION);
        assert!(chrono::NaiveDateTime::parse_from_str(&m.created, CREATED_FORMAT).is_ok());
    }
}

//! Key and button labels
//!
//! Labels are the strings stored in macro files:
//! - printable keys: the lowercase character (`a`, `7`, `;`)
//! - other keys: `Key.<name>` (`Key.esc`, `Key.shift`, `Key.f5`)
//! - unknown scan codes: `<N>`
//! - buttons: `Button.left`, `Button.right`, `Button.middle`, `Button.button<N>`
//!
//! Decoding is forgiving about case and shifted symbols, since a label only
//! names a physical key; the shift key is recorded as its own event.

use super::{Button, Key};

const KEY_PREFIX: &str = "Key.";
const BUTTON_PREFIX: &str = "Button.";

const PRINTABLE: &[(Key, char)] = &[
    // Letters
    (Key::KeyA, 'a'), (Key::KeyB, 'b'), (Key::KeyC, 'c'), (Key::KeyD, 'd'),
    (Key::KeyE, 'e'), (Key::KeyF, 'f'), (Key::KeyG, 'g'), (Key::KeyH, 'h'),
    (Key::KeyI, 'i'), (Key::KeyJ, 'j'), (Key::KeyK, 'k'), (Key::KeyL, 'l'),
    (Key::KeyM, 'm'), (Key::KeyN, 'n'), (Key::KeyO, 'o'), (Key::KeyP, 'p'),
    (Key::KeyQ, 'q'), (Key::KeyR, 'r'), (Key::KeyS, 's'), (Key::KeyT, 't'),
    (Key::KeyU, 'u'), (Key::KeyV, 'v'), (Key::KeyW, 'w'), (Key::KeyX, 'x'),
    (Key::KeyY, 'y'), (Key::KeyZ, 'z'),
    // Numbers
    (Key::Num0, '0'), (Key::Num1, '1'), (Key::Num2, '2'), (Key::Num3, '3'),
    (Key::Num4, '4'), (Key::Num5, '5'), (Key::Num6, '6'), (Key::Num7, '7'),
    (Key::Num8, '8'), (Key::Num9, '9'),
    // Punctuation
    (Key::Minus, '-'), (Key::Equal, '='), (Key::LeftBracket, '['),
    (Key::RightBracket, ']'), (Key::SemiColon, ';'), (Key::Quote, '\''),
    (Key::BackSlash, '\\'), (Key::BackQuote, '`'), (Key::Comma, ','),
    (Key::Dot, '.'), (Key::Slash, '/'),
];

// US layout
const SHIFTED: &[(char, Key)] = &[
    ('!', Key::Num1), ('@', Key::Num2), ('#', Key::Num3), ('$', Key::Num4),
    ('%', Key::Num5), ('^', Key::Num6), ('&', Key::Num7), ('*', Key::Num8),
    ('(', Key::Num9), (')', Key::Num0), ('_', Key::Minus), ('+', Key::Equal),
    ('{', Key::LeftBracket), ('}', Key::RightBracket), (':', Key::SemiColon),
    ('"', Key::Quote), ('|', Key::BackSlash), ('~', Key::BackQuote),
    ('<', Key::Comma), ('>', Key::Dot), ('?', Key::Slash),
];

const NAMED: &[(Key, &str)] = &[
    (Key::Alt, "alt"),
    (Key::AltGr, "alt_gr"),
    (Key::Backspace, "backspace"),
    (Key::CapsLock, "caps_lock"),
    (Key::ControlLeft, "ctrl_l"),
    (Key::ControlRight, "ctrl_r"),
    (Key::Delete, "delete"),
    (Key::DownArrow, "down"),
    (Key::End, "end"),
    (Key::Escape, "esc"),
    (Key::F1, "f1"), (Key::F2, "f2"), (Key::F3, "f3"), (Key::F4, "f4"),
    (Key::F5, "f5"), (Key::F6, "f6"), (Key::F7, "f7"), (Key::F8, "f8"),
    (Key::F9, "f9"), (Key::F10, "f10"), (Key::F11, "f11"), (Key::F12, "f12"),
    (Key::Home, "home"),
    (Key::LeftArrow, "left"),
    (Key::MetaLeft, "cmd"),
    (Key::MetaRight, "cmd_r"),
    (Key::PageDown, "page_down"),
    (Key::PageUp, "page_up"),
    (Key::Return, "enter"),
    (Key::RightArrow, "right"),
    (Key::ShiftLeft, "shift"),
    (Key::ShiftRight, "shift_r"),
    (Key::Space, "space"),
    (Key::Tab, "tab"),
    (Key::UpArrow, "up"),
    (Key::PrintScreen, "print_screen"),
    (Key::ScrollLock, "scroll_lock"),
    (Key::Pause, "pause"),
    (Key::NumLock, "num_lock"),
    (Key::Insert, "insert"),
    (Key::IntlBackslash, "intl_backslash"),
    (Key::Function, "fn"),
    // Keypad
    (Key::KpReturn, "kp_enter"),
    (Key::KpMinus, "kp_minus"),
    (Key::KpPlus, "kp_plus"),
    (Key::KpMultiply, "kp_multiply"),
    (Key::KpDivide, "kp_divide"),
    (Key::KpDelete, "kp_delete"),
    (Key::Kp0, "kp_0"), (Key::Kp1, "kp_1"), (Key::Kp2, "kp_2"), (Key::Kp3, "kp_3"),
    (Key::Kp4, "kp_4"), (Key::Kp5, "kp_5"), (Key::Kp6, "kp_6"), (Key::Kp7, "kp_7"),
    (Key::Kp8, "kp_8"), (Key::Kp9, "kp_9"),
];

/// Decode-only spellings
const ALIASES: &[(&str, Key)] = &[
    ("alt_l", Key::Alt),
    ("alt_r", Key::AltGr),
    ("ctrl", Key::ControlLeft),
    ("cmd_l", Key::MetaLeft),
    ("shift_l", Key::ShiftLeft),
    ("return", Key::Return),
    ("escape", Key::Escape),
];

pub fn encode_key(key: Key) -> String {
    if let Key::Unknown(code) = key {
        return format!("<{}>", code);
    }
    if let Some((_, c)) = PRINTABLE.iter().find(|(k, _)| *k == key) {
        return c.to_string();
    }
    match NAMED.iter().find(|(k, _)| *k == key) {
        Some((_, name)) => format!("{}{}", KEY_PREFIX, name),
        // Not decodable; playback skips it
        None => format!("{}{:?}", KEY_PREFIX, key),
    }
}

pub fn decode_key(label: &str) -> Option<Key> {
    if let Some(name) = label.strip_prefix(KEY_PREFIX) {
        let name = name.to_ascii_lowercase();
        return NAMED
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(k, _)| *k)
            .or_else(|| ALIASES.iter().find(|(n, _)| *n == name).map(|(_, k)| *k));
    }

    if let Some(code) = label.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        return code.parse().ok().map(Key::Unknown);
    }

    let mut chars = label.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    decode_char(c)
}

fn decode_char(c: char) -> Option<Key> {
    if c == ' ' {
        return Some(Key::Space);
    }
    let lower = c.to_ascii_lowercase();
    PRINTABLE
        .iter()
        .find(|(_, p)| *p == lower)
        .map(|(k, _)| *k)
        .or_else(|| SHIFTED.iter().find(|(s, _)| *s == c).map(|(_, k)| *k))
}

pub fn encode_button(button: Button) -> String {
    match button {
        Button::Left => format!("{}left", BUTTON_PREFIX),
        Button::Right => format!("{}right", BUTTON_PREFIX),
        Button::Middle => format!("{}middle", BUTTON_PREFIX),
        Button::Unknown(n) => format!("{}button{}", BUTTON_PREFIX, n),
    }
}

pub fn decode_button(label: &str) -> Option<Button> {
    match label.strip_prefix(BUTTON_PREFIX)? {
        "left" => Some(Button::Left),
        "right" => Some(Button::Right),
        "middle" => Some(Button::Middle),
        other => other
            .strip_prefix("button")
            .and_then(|n| n.parse().ok())
            .map(Button::Unknown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_encoded_key_decodes_back() {
        let keys = PRINTABLE
            .iter()
            .map(|(k, _)| *k)
            .chain(NAMED.iter().map(|(k, _)| *k))
            .chain([Key::Unknown(179)]);
        for key in keys {
            let label = encode_key(key);
            assert_eq!(decode_key(&label), Some(key), "label {}", label);
        }
    }

    #[test]
    fn labels_match_file_contract() {
        assert_eq!(encode_key(Key::KeyA), "a");
        assert_eq!(encode_key(Key::Escape), "Key.esc");
        assert_eq!(encode_key(Key::Space), "Key.space");
        assert_eq!(encode_key(Key::Unknown(65)), "<65>");
        assert_eq!(encode_button(Button::Left), "Button.left");
    }

    #[test]
    fn decode_accepts_case_shift_and_aliases() {
        assert_eq!(decode_key("A"), Some(Key::KeyA));
        assert_eq!(decode_key("!"), Some(Key::Num1));
        assert_eq!(decode_key(" "), Some(Key::Space));
        assert_eq!(decode_key("Key.ctrl"), Some(Key::ControlLeft));
        assert_eq!(decode_key("Key.ESC"), Some(Key::Escape));
    }

    #[test]
    fn garbage_labels_do_not_resolve() {
        assert_eq!(decode_key(""), None);
        assert_eq!(decode_key("ab"), None);
        assert_eq!(decode_key("Key.warp_drive"), None);
        assert_eq!(decode_key("<x>"), None);
        assert_eq!(decode_button("left"), None);
        assert_eq!(decode_button("Button.side"), None);
    }

    #[test]
    fn buttons_round_trip() {
        for b in [Button::Left, Button::Right, Button::Middle, Button::Unknown(8)] {
            assert_eq!(decode_button(&encode_button(b)), Some(b));
        }
    }
}

//! Local input events and the key matching rules used by the router.

use crate::protocol::HandlerKey;

pub const KEY_BACKSPACE: u32 = 8;
pub const KEY_ENTER: u32 = 13;
pub const KEY_UP: u32 = 38;
pub const KEY_DOWN: u32 = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
    };

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }
}

/// A keyboard event as reported by the host surface.
///
/// `code` follows browser key codes (letters are their uppercase ASCII value,
/// Enter is 13); `key` is the produced character, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Option<char>,
    pub code: u32,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Option<char>, code: u32, modifiers: Modifiers) -> Self {
        Self { key, code, modifiers }
    }

    /// Event for a character-producing key without modifiers.
    pub fn char(c: char) -> Self {
        let code = if c.is_ascii_alphabetic() {
            u32::from(c.to_ascii_uppercase())
        } else {
            u32::from(c)
        };
        Self::new(Some(c), code, Modifiers::NONE)
    }

    pub fn code(code: u32) -> Self {
        Self::new(None, code, Modifiers::NONE)
    }

    pub fn enter() -> Self {
        Self::new(Some('\r'), KEY_ENTER, Modifiers::NONE)
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// The character this event would insert into the input, if any.
    pub fn printable(&self) -> Option<char> {
        if self.modifiers.ctrl || self.modifiers.alt {
            return None;
        }
        self.key.filter(|c| !c.is_control())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    /// Character-producing key (including the line terminator).
    KeyPress(KeyEvent),
    /// Pointer released over the transcript.
    PointerUp { has_selection: bool, input_focused: bool },
}

/// Key code plus an exact modifier set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub code: u32,
    pub modifiers: Modifiers,
}

impl KeyChord {
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.code == self.code && event.modifiers == self.modifiers
    }
}

impl HandlerKey {
    /// A single produced character compared case-insensitively, or the raw
    /// key code, plus an exact modifier match.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        let by_char = match (event.key, self.key.as_deref()) {
            (Some(pressed), Some(bound)) => {
                let mut bound_chars = bound.chars();
                match (bound_chars.next(), bound_chars.next()) {
                    (Some(b), None) => pressed.to_lowercase().eq(b.to_lowercase()),
                    _ => false,
                }
            }
            _ => false,
        };
        let matched = by_char || self.key_code == Some(event.code);
        matched
            && event.modifiers
                == Modifiers {
                    ctrl: self.ctrl_key,
                    shift: self.shift_key,
                    alt: self.alt_key,
                }
    }
}

/// One-shot replacement for the default key-press handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPressOverride {
    /// Swallow every key-press; the line terminator restarts the session.
    AwaitEnterToRestart,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(key: Option<&str>, key_code: Option<u32>, ctrl: bool) -> HandlerKey {
        HandlerKey {
            id: "h".into(),
            key: key.map(str::to_string),
            key_code,
            ctrl_key: ctrl,
            ..HandlerKey::default()
        }
    }

    #[test]
    fn chord_requires_exact_modifiers() {
        let chord = KeyChord {
            code: 81,
            modifiers: Modifiers::ctrl(),
        };
        assert!(chord.matches(&KeyEvent::new(Some('q'), 81, Modifiers::ctrl())));
        assert!(!chord.matches(&KeyEvent::char('q')));
        let ctrl_shift = Modifiers {
            shift: true,
            ..Modifiers::ctrl()
        };
        assert!(!chord.matches(&KeyEvent::new(Some('Q'), 81, ctrl_shift)));
    }

    #[test]
    fn handler_key_matches_character_case_insensitively() {
        let key = handler(Some("s"), None, true);
        assert!(key.matches(&KeyEvent::new(Some('S'), 83, Modifiers::ctrl())));
        assert!(!key.matches(&KeyEvent::new(Some('s'), 83, Modifiers::NONE)));
    }

    #[test]
    fn handler_key_falls_back_to_key_code() {
        let key = handler(None, Some(113), false);
        assert!(key.matches(&KeyEvent::code(113)));
        assert!(!key.matches(&KeyEvent::code(114)));
    }

    #[test]
    fn printable_ignores_control_chords() {
        assert_eq!(KeyEvent::char('a').printable(), Some('a'));
        assert_eq!(KeyEvent::char('a').with_modifiers(Modifiers::ctrl()).printable(), None);
        assert_eq!(KeyEvent::enter().printable(), None);
    }
}

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::trace;

use crate::input::{KeyChord, Modifiers};
use crate::protocol::SettingDelta;

pub const INTERRUPT_KEY_CODE: &str = "userInterruptKeyCode";
pub const INTERRUPT_KEY_CTRL: &str = "userInterruptKeyCtrl";
pub const INTERRUPT_KEY_SHIFT: &str = "userInterruptKeyShift";
pub const INTERRUPT_KEY_ALT: &str = "userInterruptKeyAlt";
pub const PANE_STYLE_CLASS: &str = "paneStyleClass";
pub const PANE_BACKGROUND_COLOR: &str = "paneBackgroundColor";

const REGIONS: [&str; 2] = ["prompt", "input"];

/// Display and behavior options, seeded with defaults and updated by deltas.
///
/// Values are kept as raw JSON so unknown keys survive untouched; the typed
/// accessors interpret the recognized ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    values: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert(INTERRUPT_KEY_CODE.to_string(), Value::from(u32::from(b'Q')));
        values.insert(INTERRUPT_KEY_CTRL.to_string(), Value::Bool(true));
        values.insert(INTERRUPT_KEY_SHIFT.to_string(), Value::Bool(false));
        values.insert(INTERRUPT_KEY_ALT.to_string(), Value::Bool(false));
        for region in REGIONS {
            for suffix in ["StyleClass", "Color", "BackgroundColor"] {
                values.insert(format!("{region}{suffix}"), Value::from(""));
            }
            for suffix in ["Bold", "Italic", "Underline"] {
                values.insert(format!("{region}{suffix}"), Value::Bool(false));
            }
        }
        values.insert(PANE_STYLE_CLASS.to_string(), Value::from(""));
        values.insert(PANE_BACKGROUND_COLOR.to_string(), Value::from(""));
        Self { values }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies deltas in order, last write wins. Returns how many were applied.
    pub fn apply(&mut self, deltas: &[SettingDelta]) -> usize {
        for delta in deltas {
            trace!(target = "textterm.settings", key = %delta.key, value = %delta.value, "setting applied");
            self.values.insert(delta.key.clone(), delta.value.clone());
        }
        deltas.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn interrupt_chord(&self) -> KeyChord {
        KeyChord {
            code: self.code(INTERRUPT_KEY_CODE).unwrap_or(u32::from(b'Q')),
            modifiers: Modifiers {
                ctrl: self.flag(INTERRUPT_KEY_CTRL),
                shift: self.flag(INTERRUPT_KEY_SHIFT),
                alt: self.flag(INTERRUPT_KEY_ALT),
            },
        }
    }

    pub fn prompt_style(&self) -> RegionStyle {
        self.region_style("prompt")
    }

    pub fn input_style(&self) -> RegionStyle {
        self.region_style("input")
    }

    pub fn pane_style(&self) -> PaneStyle {
        PaneStyle {
            background: self.color(PANE_BACKGROUND_COLOR),
            style_class: self.text(PANE_STYLE_CLASS),
        }
    }

    fn region_style(&self, region: &str) -> RegionStyle {
        RegionStyle {
            color: self.color(&format!("{region}Color")),
            background: self.color(&format!("{region}BackgroundColor")),
            bold: self.flag(&format!("{region}Bold")),
            italic: self.flag(&format!("{region}Italic")),
            underline: self.flag(&format!("{region}Underline")),
            style_class: self.text(&format!("{region}StyleClass")),
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        let text = match self.values.get(key)? {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    fn color(&self, key: &str) -> Option<String> {
        self.text(key)
            .filter(|c| !matches!(c.as_str(), "default" | "null" | "none"))
    }

    fn flag(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        }
    }

    fn code(&self, key: &str) -> Option<u32> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok().or_else(|| {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(u32::from(c.to_ascii_uppercase())),
                    _ => None,
                }
            }),
            _ => None,
        }
    }
}

/// Visual attributes of a prompt or input segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionStyle {
    pub color: Option<String>,
    pub background: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub style_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaneStyle {
    pub background: Option<String>,
    pub style_class: Option<String>,
}

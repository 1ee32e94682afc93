//! Wire shapes exchanged with the remote text session.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::action::Action;

/// Body returned by the data (poll) and init endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TermResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub reset_required: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub line_reset_required: bool,
    pub reset_to_bookmark: Option<String>,
    pub bookmark: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub handler_keys: Vec<HandlerKey>,
    #[serde(deserialize_with = "null_as_default")]
    pub message_groups: Vec<MessageGroup>,
    #[serde(deserialize_with = "null_as_default")]
    pub action: Action,
    pub action_data: Option<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub move_to_line_start_required: bool,
}

/// Settings deltas plus the markup fragments rendered under them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageGroup {
    #[serde(deserialize_with = "null_as_default")]
    pub messages: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub settings: Vec<SettingDelta>,
}

impl MessageGroup {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
            settings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDelta {
    pub key: String,
    pub value: Value,
}

impl SettingDelta {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Server-registered shortcut: a literal character or a raw key code plus an
/// exact modifier set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandlerKey {
    pub id: String,
    pub key: Option<String>,
    pub key_code: Option<u32>,
    #[serde(deserialize_with = "null_as_default")]
    pub ctrl_key: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub shift_key: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub alt_key: bool,
}

/// What a write to the input endpoint carries besides the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Line,
    Interrupt,
    Handler(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRequest {
    pub text: String,
    pub kind: InputKind,
}

/// Outbound request produced by the session for the engine to dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Init(Value),
    Poll { nonce: String },
    Input(InputRequest),
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

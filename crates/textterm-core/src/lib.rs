//! textterm core: keeps a line-oriented console in sync with a remote text
//! session.
//!
//! Responsibilities:
//! - tracking the server-driven interaction mode (read, masked read, virtual, ...)
//! - maintaining the transcript as an ordered ledger of prompt/input pairs,
//!   including bookmark rollback
//! - recalling locally submitted lines
//! - routing local key and pointer events into submissions
//! - driving the single-outstanding-poll protocol loop over a pluggable transport
//!
//! [`Session`] holds all state and performs no I/O; [`Engine`] owns a session
//! and runs the poll loop on tokio.

pub mod action;
pub mod engine;
pub mod history;
pub mod input;
pub mod ledger;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod transport;

pub use action::{Action, ActionState};
pub use engine::{
    DefaultHooks, DisplaySurface, Engine, EngineClosed, EngineConfig, EngineHandle, HostCommand,
    SessionHooks,
};
pub use history::{History, HistoryStore, MemoryHistoryStore, StoreError, HISTORY_KEY};
pub use input::{InputEvent, KeyChord, KeyEvent, KeyPressOverride, Modifiers};
pub use ledger::{InputState, Ledger, LinePair, PairId, PromptStyle};
pub use protocol::{
    HandlerKey, InputKind, InputRequest, MessageGroup, Request, SettingDelta, TermResponse,
};
pub use session::{
    Applied, EventOutcome, FailureOutcome, Notification, Session, SessionId, SurfaceEffect,
    DEFAULT_RETRY_DELAY, ERROR_PROMPT_STYLE,
};
pub use settings::{PaneStyle, RegionStyle, Settings};
pub use transport::{FailureKind, Transport, TransportError};

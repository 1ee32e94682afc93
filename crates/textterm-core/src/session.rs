//! Sans-IO session state: response application, submissions, input routing
//! and failure recovery.
//!
//! Every method runs to completion without awaiting; outbound work is
//! returned as [`Request`]s and display work is queued as [`SurfaceEffect`]s.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::action::{Action, ActionState};
use crate::history::History;
use crate::input::{InputEvent, KeyEvent, KeyPressOverride, KEY_BACKSPACE, KEY_DOWN, KEY_ENTER, KEY_UP};
use crate::ledger::{Ledger, PairId, PromptStyle};
use crate::protocol::{HandlerKey, InputKind, InputRequest, MessageGroup, Request, TermResponse};
use crate::settings::{PaneStyle, Settings};
use crate::transport::{FailureKind, TransportError};

pub const ERROR_PROMPT_STYLE: &str = "textterm-error-prompt";
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

const SESSION_EXPIRED_MESSAGE: &str = "<h2>Session expired.</h2><br>Press enter to restart.";
const SERVER_ERROR_MESSAGE: &str = "<h2>Server error.</h2><br>Press enter to restart.";

/// Identifier sent with every request; generated once per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEffect {
    FocusInput,
    MoveCaretToEnd,
    ScrollToEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Dispose(Option<Value>),
    Abort,
}

/// Result of applying one response.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub mode: Action,
    pub poll_again: bool,
    pub notification: Option<Notification>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Poll again after the delay.
    Retry(Duration),
    /// A restart prompt is on screen; the next line terminator replays init.
    Recovering,
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOutcome {
    pub requests: Vec<Request>,
    pub prevent_default: bool,
}

pub struct Session {
    id: SessionId,
    settings: Settings,
    ledger: Ledger,
    history: History,
    action: ActionState,
    handler_keys: Vec<HandlerKey>,
    pending_input: String,
    pane_style: PaneStyle,
    init_payload: Option<Value>,
    press_override: Option<KeyPressOverride>,
    poll_in_flight: bool,
    terminated: bool,
    retry_delay: Duration,
    effects: Vec<SurfaceEffect>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("pairs", &self.ledger.len())
            .field("poll_in_flight", &self.poll_in_flight)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(history: History) -> Self {
        let settings = Settings::default();
        let ledger = Ledger::new(PromptStyle::Normal(settings.prompt_style()), settings.input_style());
        let pane_style = settings.pane_style();
        let id = SessionId::generate();
        debug!(target = "textterm.session", session_id = %id, "creating new session");
        Self {
            id,
            settings,
            ledger,
            history,
            action: ActionState::new(),
            handler_keys: Vec::new(),
            pending_input: String::new(),
            pane_style,
            init_payload: None,
            press_override: None,
            poll_in_flight: false,
            terminated: false,
            retry_delay: DEFAULT_RETRY_DELAY,
            effects: Vec::new(),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn mode(&self) -> Action {
        self.action.current()
    }

    pub fn previous_mode(&self) -> Action {
        self.action.previous()
    }

    pub fn is_masked(&self) -> bool {
        self.mode().is_masked()
    }

    pub fn handler_keys(&self) -> &[HandlerKey] {
        &self.handler_keys
    }

    /// Input saved when a shortcut suspended editing.
    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn pane_style(&self) -> &PaneStyle {
        &self.pane_style
    }

    pub fn press_override(&self) -> Option<KeyPressOverride> {
        self.press_override
    }

    pub fn is_poll_in_flight(&self) -> bool {
        self.poll_in_flight
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn input(&self) -> &str {
        self.ledger.active().input()
    }

    pub fn drain_effects(&mut self) -> Vec<SurfaceEffect> {
        std::mem::take(&mut self.effects)
    }

    /// Stops all further requests. Idempotent.
    pub fn terminate(&mut self) {
        if !self.terminated {
            info!(target = "textterm.session", session_id = %self.id, "terminating session");
            self.terminated = true;
        }
    }

    pub fn initialize(&mut self, payload: Value) -> Option<Request> {
        if self.terminated {
            return None;
        }
        self.action.clear();
        self.init_payload = Some(payload.clone());
        Some(Request::Init(payload))
    }

    /// Replays the last initialization payload.
    pub fn restart(&mut self) -> Option<Request> {
        let Some(payload) = self.init_payload.clone() else {
            warn!(target = "textterm.session", "restart requested before any initialization");
            return None;
        };
        info!(target = "textterm.session", session_id = %self.id, "restarting session");
        self.ledger.set_editable(true);
        self.initialize(payload)
    }

    /// Next poll request, unless one is outstanding or the session ended.
    pub fn next_poll(&mut self) -> Option<Request> {
        if self.terminated || self.poll_in_flight {
            return None;
        }
        self.poll_in_flight = true;
        Some(Request::Poll {
            nonce: Uuid::new_v4().to_string(),
        })
    }

    pub fn on_poll_response(&mut self, response: TermResponse) -> Applied {
        self.poll_in_flight = false;
        self.apply_response(response)
    }

    pub fn on_init_response(&mut self, response: TermResponse) -> Applied {
        self.apply_response(response)
    }

    pub fn on_poll_failure(&mut self, err: &TransportError) -> FailureOutcome {
        self.poll_in_flight = false;
        self.handle_failure(err, true)
    }

    pub fn on_init_failure(&mut self, err: &TransportError) -> FailureOutcome {
        self.handle_failure(err, true)
    }

    /// Input writes are never retried; only expiry and server errors matter.
    pub fn on_input_failure(&mut self, err: &TransportError) -> FailureOutcome {
        self.handle_failure(err, false)
    }

    fn handle_failure(&mut self, err: &TransportError, retry: bool) -> FailureOutcome {
        if self.terminated {
            return FailureOutcome::Ignored;
        }
        match err.failure_kind() {
            FailureKind::SessionExpired => {
                info!(target = "textterm.session", session_id = %self.id, "session expired");
                self.recover(SESSION_EXPIRED_MESSAGE);
                FailureOutcome::Recovering
            }
            FailureKind::ServerError => {
                error!(target = "textterm.session", session_id = %self.id, error = %err, "server error");
                self.recover(SERVER_ERROR_MESSAGE);
                FailureOutcome::Recovering
            }
            FailureKind::Transient => {
                match err.status() {
                    Some(status) if status >= 400 => {
                        warn!(target = "textterm.session", status, "request failed")
                    }
                    Some(status) if status >= 300 => {
                        info!(target = "textterm.session", status, "request failed")
                    }
                    _ => debug!(target = "textterm.session", error = %err, "request failed"),
                }
                if retry {
                    FailureOutcome::Retry(self.retry_delay)
                } else {
                    FailureOutcome::Ignored
                }
            }
        }
    }

    fn recover(&mut self, message: &str) {
        self.ledger.reset();
        self.display_error(message);
        self.ledger.set_editable(false);
        self.press_override = Some(KeyPressOverride::AwaitEnterToRestart);
    }

    fn apply_response(&mut self, response: TermResponse) -> Applied {
        if self.terminated {
            return Applied {
                mode: self.mode(),
                poll_again: false,
                notification: None,
            };
        }
        let TermResponse {
            reset_required,
            line_reset_required,
            reset_to_bookmark,
            bookmark,
            handler_keys,
            message_groups,
            action,
            action_data,
            move_to_line_start_required,
        } = response;

        if reset_required {
            self.ledger.reset();
        }
        if line_reset_required {
            self.ledger.reset_line();
        }
        if let Some(label) = reset_to_bookmark.filter(|label| !label.is_empty()) {
            let prompt_style = self.prompt_style(None);
            if !self.ledger.reset_to_bookmark(&label, prompt_style, self.settings.input_style()) {
                debug!(target = "textterm.session", bookmark = %label, "bookmark no longer in transcript");
            }
            self.pane_style = self.settings.pane_style();
        }
        if let Some(label) = bookmark.filter(|label| !label.is_empty()) {
            self.ledger.set_bookmark(&label);
        }
        self.register_handler_keys(handler_keys);
        self.display_message_groups(&message_groups, None, move_to_line_start_required);

        trace!(target = "textterm.session", directive = ?action, "applying directive");
        let mode = self.action.apply_directive(action);
        // a NONE directive keeps FLUSH and CLEAR_OLD_INPUT in force
        match mode {
            Action::Flush => {
                self.open_pair("", None);
                self.effects.push(SurfaceEffect::FocusInput);
            }
            Action::ClearOldInput => self.pending_input.clear(),
            _ => {}
        }
        if action == Action::ContinueRead {
            debug!(target = "textterm.session", mode = ?mode, "continue read");
            self.pending_input.clear();
            self.ledger.set_editable(true);
            self.effects.push(SurfaceEffect::FocusInput);
        }
        if mode.is_read() && !self.pending_input.is_empty() {
            let restored = std::mem::take(&mut self.pending_input);
            self.ledger.mark_next_as_current_line();
            self.open_pair("", None);
            self.ledger.set_input(&restored);
            self.ledger.set_editable(true);
            self.effects.push(SurfaceEffect::FocusInput);
            self.effects.push(SurfaceEffect::MoveCaretToEnd);
        }
        self.ledger.set_masked(mode.is_masked());

        let notification = match mode {
            Action::Dispose => Some(Notification::Dispose(action_data)),
            Action::Abort => Some(Notification::Abort),
            _ => None,
        };
        if notification.is_some() {
            self.ledger.set_editable(false);
            self.terminate();
        }
        Applied {
            mode,
            poll_again: notification.is_none(),
            notification,
        }
    }

    fn register_handler_keys(&mut self, keys: Vec<HandlerKey>) {
        for key in keys {
            trace!(target = "textterm.session", handler_id = %key.id, "registering handler key");
            match self.handler_keys.iter_mut().find(|existing| existing.id == key.id) {
                Some(existing) => *existing = key,
                None => self.handler_keys.push(key),
            }
        }
    }

    /// Renders a local message, optionally under a special prompt style tag.
    pub fn display_message(&mut self, markup: &str, style: Option<&str>) {
        self.display_message_groups(&[MessageGroup::text(markup)], style, false);
    }

    pub fn display_error(&mut self, markup: &str) {
        self.display_message(markup, Some(ERROR_PROMPT_STYLE));
    }

    fn display_message_groups(&mut self, groups: &[MessageGroup], special: Option<&str>, move_to_line_start: bool) {
        let mut first = true;
        let mut line_break = false;
        for group in groups {
            let applied = self.settings.apply(&group.settings);
            if group.messages.is_empty() {
                continue;
            }
            let mut markup = String::new();
            for message in &group.messages {
                markup.push_str(message);
                if ends_with_line_break(message) {
                    line_break = true;
                }
            }
            if first && move_to_line_start {
                let style = self.prompt_style(special);
                self.ledger.restyle_active_prompt(style);
                self.ledger.clear_current_line_prompt();
            } else if special.is_some() || applied > 0 || (first && !self.pending_input.is_empty()) {
                self.open_pair("", special);
            }
            self.ledger.append_prompt(&markup);
            self.effects.push(SurfaceEffect::ScrollToEnd);
            self.effects.push(SurfaceEffect::FocusInput);
            first = false;
        }
        if line_break {
            self.ledger.mark_next_as_current_line();
        }
        if line_break || special.is_some() {
            self.open_pair("", None);
            self.effects.push(SurfaceEffect::FocusInput);
        }
    }

    fn prompt_style(&self, special: Option<&str>) -> PromptStyle {
        match special {
            Some(tag) => PromptStyle::Special(tag.to_string()),
            None => PromptStyle::Normal(self.settings.prompt_style()),
        }
    }

    fn open_pair(&mut self, prompt: &str, special: Option<&str>) -> PairId {
        let prompt_style = self.prompt_style(special);
        self.pane_style = self.settings.pane_style();
        self.ledger.open_pair(prompt, prompt_style, self.settings.input_style())
    }

    /// Sends `text` with the given marker. Ledger and mode changes happen
    /// here, before the request is dispatched.
    pub fn submit(&mut self, text: String, kind: InputKind) -> Option<Request> {
        if self.terminated {
            debug!(target = "textterm.session", "submission dropped after termination");
            return None;
        }
        match &kind {
            InputKind::Interrupt => info!(target = "textterm.session", "user interrupt"),
            InputKind::Handler(id) => {
                info!(target = "textterm.session", handler_id = %id, "invoking handler");
                self.pending_input = self.ledger.active().input().to_string();
                trace!(target = "textterm.session", pending = %self.pending_input, "saved pending input");
                self.action.enter_virtual();
                self.ledger.set_editable(false);
            }
            InputKind::Line => {
                self.open_pair("<br>", None);
                self.ledger.mark_next_as_current_line();
                self.open_pair("", None);
            }
        }
        self.effects.push(SurfaceEffect::FocusInput);
        Some(Request::Input(InputRequest { text, kind }))
    }

    pub fn send_interrupt(&mut self) -> Option<Request> {
        self.submit(String::new(), InputKind::Interrupt)
    }

    /// Inserts text at the end of the open input if editing is enabled.
    pub fn insert_text(&mut self, text: &str) -> bool {
        self.ledger.insert_input(text)
    }

    /// A whole key stroke for hosts that report one event per key: key-down,
    /// then key-press unless the key-down was claimed, then key-up.
    pub fn handle_keystroke(&mut self, key: KeyEvent) -> EventOutcome {
        let mut outcome = self.handle_input(InputEvent::KeyDown(key));
        if !outcome.prevent_default && key.key.is_some() {
            let press = self.handle_input(InputEvent::KeyPress(key));
            outcome.requests.extend(press.requests);
            outcome.prevent_default |= press.prevent_default;
        }
        let up = self.handle_input(InputEvent::KeyUp(key));
        outcome.requests.extend(up.requests);
        outcome
    }

    /// Routes a local event. Events the router does not claim get the
    /// default editing behavior.
    pub fn handle_input(&mut self, event: InputEvent) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        if self.terminated {
            return outcome;
        }
        match event {
            InputEvent::KeyDown(key) => {
                if self.settings.interrupt_chord().matches(&key) {
                    let text = self.input().to_string();
                    outcome.requests.extend(self.submit(text, InputKind::Interrupt));
                    outcome.prevent_default = true;
                } else if let Some(id) = self
                    .handler_keys
                    .iter()
                    .find(|handler| handler.matches(&key))
                    .map(|handler| handler.id.clone())
                {
                    debug!(target = "textterm.input", handler_id = %id, "detected handler key");
                    let text = self.input().to_string();
                    outcome.requests.extend(self.submit(text, InputKind::Handler(id)));
                    outcome.prevent_default = true;
                } else if key.code == KEY_BACKSPACE {
                    self.ledger.delete_input_backward();
                }
            }
            InputEvent::KeyUp(key) => self.browse_history(key.code),
            InputEvent::KeyPress(key) => {
                if let Some(hook) = self.press_override {
                    outcome.prevent_default = true;
                    match hook {
                        KeyPressOverride::AwaitEnterToRestart if key.code == KEY_ENTER => {
                            self.press_override = None;
                            outcome.requests.extend(self.restart());
                        }
                        KeyPressOverride::AwaitEnterToRestart => {}
                    }
                } else if key.code == KEY_ENTER {
                    let text = self.input().to_string();
                    if self.mode() != Action::ReadMasked {
                        self.history.push(text.clone());
                    }
                    outcome.requests.extend(self.submit(text, InputKind::Line));
                    outcome.prevent_default = true;
                } else if let Some(c) = key.printable() {
                    let mut buf = [0u8; 4];
                    self.ledger.insert_input(c.encode_utf8(&mut buf));
                }
            }
            InputEvent::PointerUp {
                has_selection,
                input_focused,
            } => {
                if !has_selection && !input_focused {
                    self.effects.push(SurfaceEffect::FocusInput);
                    self.effects.push(SurfaceEffect::MoveCaretToEnd);
                }
            }
        }
        outcome
    }

    /// Arrow-key recall. The cursor only moves in a read mode, but the caret
    /// is repositioned either way.
    fn browse_history(&mut self, code: u32) {
        let recall = self.mode().is_read();
        let changed = match code {
            KEY_UP if self.history.cursor() > 0 => {
                if recall {
                    if let Some(entry) = self.history.back() {
                        self.ledger.set_input(entry);
                    }
                }
                true
            }
            KEY_DOWN => {
                if recall {
                    let entry = self.history.forward();
                    self.ledger.set_input(entry);
                }
                true
            }
            _ => false,
        };
        if changed {
            self.effects.push(SurfaceEffect::MoveCaretToEnd);
        }
    }
}

fn ends_with_line_break(markup: &str) -> bool {
    markup.ends_with("<br>") || markup.ends_with("<br/>")
}

//! Async driver that owns a [`Session`], dispatches its requests through a
//! [`Transport`] and pushes the result to a [`DisplaySurface`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, trace, warn};

use crate::input::{InputEvent, KeyEvent};
use crate::ledger::Ledger;
use crate::protocol::{Request, TermResponse};
use crate::session::{Applied, FailureOutcome, Notification, Session, SurfaceEffect, DEFAULT_RETRY_DELAY};
use crate::settings::PaneStyle;
use crate::transport::{Transport, TransportError};

/// Where the transcript is drawn.
pub trait DisplaySurface: Send {
    /// Redraws the whole transcript. Called after every engine turn.
    fn render(&mut self, ledger: &Ledger, pane: &PaneStyle);

    fn apply(&mut self, effect: SurfaceEffect);
}

/// Host callbacks. The session has already stopped issuing requests by the
/// time `on_dispose` or `on_abort` runs.
pub trait SessionHooks: Send {
    fn on_data_received(&mut self, response: &TermResponse) {
        trace!(target = "textterm.engine", groups = response.message_groups.len(), "data received");
    }

    fn on_dispose(&mut self, data: Option<&Value>) {
        info!(target = "textterm.engine", data = ?data, "session disposed");
    }

    fn on_abort(&mut self) {
        info!(target = "textterm.engine", "session aborted");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl SessionHooks for DefaultHooks {}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Initialize(Value),
    Restart,
    SendInterrupt,
    DisplayMessage { text: String, style: Option<String> },
    DisplayError(String),
    Input(InputEvent),
    Keystroke(KeyEvent),
    Paste(String),
    Refresh,
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("engine is no longer running")]
pub struct EngineClosed;

/// Cloneable sender side used by the host to drive a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<HostCommand>,
}

impl EngineHandle {
    pub fn send(&self, command: HostCommand) -> Result<(), EngineClosed> {
        self.tx.send(command).map_err(|_| EngineClosed)
    }

    pub fn initialize(&self, payload: Value) -> Result<(), EngineClosed> {
        self.send(HostCommand::Initialize(payload))
    }

    pub fn restart(&self) -> Result<(), EngineClosed> {
        self.send(HostCommand::Restart)
    }

    pub fn send_interrupt(&self) -> Result<(), EngineClosed> {
        self.send(HostCommand::SendInterrupt)
    }

    pub fn display_message(&self, text: impl Into<String>, style: Option<String>) -> Result<(), EngineClosed> {
        self.send(HostCommand::DisplayMessage {
            text: text.into(),
            style,
        })
    }

    pub fn display_error(&self, text: impl Into<String>) -> Result<(), EngineClosed> {
        self.send(HostCommand::DisplayError(text.into()))
    }

    pub fn input(&self, event: InputEvent) -> Result<(), EngineClosed> {
        self.send(HostCommand::Input(event))
    }

    pub fn keystroke(&self, key: KeyEvent) -> Result<(), EngineClosed> {
        self.send(HostCommand::Keystroke(key))
    }

    pub fn paste(&self, text: impl Into<String>) -> Result<(), EngineClosed> {
        self.send(HostCommand::Paste(text.into()))
    }

    pub fn refresh(&self) -> Result<(), EngineClosed> {
        self.send(HostCommand::Refresh)
    }

    pub fn terminate(&self) -> Result<(), EngineClosed> {
        self.send(HostCommand::Terminate)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pause before re-polling after a transient failure.
    pub retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

type Pending<V> = Pin<Box<dyn Future<Output = Result<V, TransportError>> + Send>>;

#[derive(Default)]
struct InFlight {
    init: Option<Pending<TermResponse>>,
    poll: Option<Pending<TermResponse>>,
    writes: FuturesUnordered<Pending<()>>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl InFlight {
    fn is_idle(&self) -> bool {
        self.init.is_none() && self.poll.is_none() && self.writes.is_empty() && self.retry.is_none()
    }

    /// Drops everything except input writes already on the wire.
    fn cancel_reads(&mut self) {
        self.init = None;
        self.poll = None;
        self.retry = None;
    }
}

pub struct Engine<T, S, H = DefaultHooks> {
    session: Session,
    transport: Arc<T>,
    surface: S,
    hooks: H,
    commands: mpsc::UnboundedReceiver<HostCommand>,
}

impl<T, S, H> Engine<T, S, H>
where
    T: Transport + 'static,
    S: DisplaySurface,
    H: SessionHooks,
{
    pub fn new(session: Session, transport: T, surface: S, hooks: H, config: EngineConfig) -> (Self, EngineHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let engine = Self {
            session: session.with_retry_delay(config.retry_delay),
            transport: Arc::new(transport),
            surface,
            hooks,
            commands,
        };
        (engine, EngineHandle { tx })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs until the session terminates (and queued writes finish) or every
    /// handle is dropped with nothing left in flight. Returns the final
    /// session state.
    pub async fn run(mut self) -> Session {
        let mut inflight = InFlight::default();
        let mut commands_open = true;
        debug!(target = "textterm.engine", session_id = %self.session.id(), "engine started");
        self.flush_surface();

        loop {
            if self.session.is_terminated() {
                inflight.cancel_reads();
                if inflight.writes.is_empty() {
                    break;
                }
            }
            if !commands_open && inflight.is_idle() {
                break;
            }

            tokio::select! {
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command, &mut inflight),
                    None => {
                        debug!(target = "textterm.engine", "all engine handles dropped");
                        commands_open = false;
                    }
                },
                result = wait_for(&mut inflight.init) => {
                    inflight.init = None;
                    match result {
                        Ok(response) => {
                            self.hooks.on_data_received(&response);
                            let applied = self.session.on_init_response(response);
                            self.after_response(applied, &mut inflight);
                        }
                        Err(err) => {
                            let outcome = self.session.on_init_failure(&err);
                            self.after_failure(outcome, &mut inflight);
                        }
                    }
                }
                result = wait_for(&mut inflight.poll) => {
                    inflight.poll = None;
                    match result {
                        Ok(response) => {
                            self.hooks.on_data_received(&response);
                            let applied = self.session.on_poll_response(response);
                            self.after_response(applied, &mut inflight);
                        }
                        Err(err) => {
                            let outcome = self.session.on_poll_failure(&err);
                            self.after_failure(outcome, &mut inflight);
                        }
                    }
                }
                Some(result) = inflight.writes.next(), if !inflight.writes.is_empty() => {
                    if let Err(err) = result {
                        let outcome = self.session.on_input_failure(&err);
                        self.after_failure(outcome, &mut inflight);
                    }
                }
                () = wait_sleep(&mut inflight.retry) => {
                    inflight.retry = None;
                    trace!(target = "textterm.engine", "retrying poll");
                    self.poll_next(&mut inflight);
                }
            }

            self.flush_surface();
        }

        debug!(target = "textterm.engine", session_id = %self.session.id(), "engine stopped");
        self.flush_surface();
        self.session
    }

    fn handle_command(&mut self, command: HostCommand, inflight: &mut InFlight) {
        trace!(target = "textterm.engine", command = ?command, "host command");
        match command {
            HostCommand::Initialize(payload) => {
                let request = self.session.initialize(payload);
                self.dispatch_all(request, inflight);
            }
            HostCommand::Restart => {
                let request = self.session.restart();
                self.dispatch_all(request, inflight);
            }
            HostCommand::SendInterrupt => {
                let request = self.session.send_interrupt();
                self.dispatch_all(request, inflight);
            }
            HostCommand::DisplayMessage { text, style } => self.session.display_message(&text, style.as_deref()),
            HostCommand::DisplayError(text) => self.session.display_error(&text),
            HostCommand::Input(event) => {
                let outcome = self.session.handle_input(event);
                self.dispatch_all(outcome.requests, inflight);
            }
            HostCommand::Keystroke(key) => {
                let outcome = self.session.handle_keystroke(key);
                self.dispatch_all(outcome.requests, inflight);
            }
            HostCommand::Paste(text) => {
                let flattened: String = text
                    .chars()
                    .filter(|c| *c != '\r')
                    .map(|c| if c == '\n' { ' ' } else { c })
                    .collect();
                if !self.session.insert_text(&flattened) {
                    debug!(target = "textterm.engine", "paste ignored while input is not editable");
                }
            }
            HostCommand::Refresh => {}
            HostCommand::Terminate => self.session.terminate(),
        }
    }

    fn after_response(&mut self, applied: Applied, inflight: &mut InFlight) {
        match applied.notification {
            Some(Notification::Dispose(data)) => self.hooks.on_dispose(data.as_ref()),
            Some(Notification::Abort) => self.hooks.on_abort(),
            None => {}
        }
        if applied.poll_again {
            self.poll_next(inflight);
        }
    }

    fn after_failure(&mut self, outcome: FailureOutcome, inflight: &mut InFlight) {
        match outcome {
            FailureOutcome::Retry(delay) => {
                debug!(target = "textterm.engine", delay_ms = delay.as_millis() as u64, "scheduling retry");
                inflight.retry = Some(Box::pin(sleep(delay)));
            }
            FailureOutcome::Recovering => {
                warn!(target = "textterm.engine", "waiting for the user to restart the session");
                inflight.retry = None;
            }
            FailureOutcome::Ignored => {}
        }
    }

    fn poll_next(&mut self, inflight: &mut InFlight) {
        let request = self.session.next_poll();
        self.dispatch_all(request, inflight);
    }

    fn dispatch_all(&mut self, requests: impl IntoIterator<Item = Request>, inflight: &mut InFlight) {
        for request in requests {
            self.dispatch(request, inflight);
        }
    }

    fn dispatch(&mut self, request: Request, inflight: &mut InFlight) {
        let transport = Arc::clone(&self.transport);
        let session_id = self.session.id().clone();
        match request {
            Request::Init(payload) => {
                debug!(target = "textterm.engine", session_id = %session_id, "posting init");
                inflight.retry = None;
                inflight.init = Some(Box::pin(async move { transport.init(&session_id, &payload).await }));
            }
            Request::Poll { nonce } => {
                trace!(target = "textterm.engine", nonce = %nonce, "polling");
                inflight.poll = Some(Box::pin(async move { transport.poll(&session_id, &nonce).await }));
            }
            Request::Input(input) => {
                debug!(target = "textterm.engine", kind = ?input.kind, "posting input");
                inflight
                    .writes
                    .push(Box::pin(async move { transport.send_input(&session_id, &input).await }));
            }
        }
    }

    fn flush_surface(&mut self) {
        self.surface.render(self.session.ledger(), self.session.pane_style());
        for effect in self.session.drain_effects() {
            self.surface.apply(effect);
        }
    }
}

async fn wait_for<V>(slot: &mut Option<Pending<V>>) -> Result<V, TransportError> {
    match slot.as_mut() {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

async fn wait_sleep(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot.as_mut() {
        Some(delay) => delay.await,
        None => std::future::pending().await,
    }
}

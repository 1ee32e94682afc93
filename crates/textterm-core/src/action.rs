use serde::{Deserialize, Serialize};

/// Interaction mode requested by the server (or entered locally for `Virtual`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    #[default]
    None,
    Read,
    ReadMasked,
    ContinueRead,
    Virtual,
    Flush,
    ClearOldInput,
    Abort,
    Dispose,
    /// Any directive this client does not know. It still replaces the mode.
    #[serde(other)]
    Unknown,
}

impl Action {
    /// `Read` and `ReadMasked`: the modes in which the user composes a line.
    pub fn is_read(self) -> bool {
        matches!(self, Action::Read | Action::ReadMasked)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Action::Abort | Action::Dispose)
    }

    pub fn is_masked(self) -> bool {
        self == Action::ReadMasked
    }
}

/// Current and previous interaction mode.
///
/// `previous` is only written when a shortcut puts the session into
/// [`Action::Virtual`]; it is what [`Action::ContinueRead`] resumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionState {
    current: Action,
    previous: Action,
}

impl ActionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Action {
        self.current
    }

    pub fn previous(&self) -> Action {
        self.previous
    }

    /// Resolves a server directive and returns the resulting mode.
    ///
    /// `None` leaves the mode untouched. `ContinueRead` never sticks: it
    /// resolves to the remembered read mode, or plain `Read`.
    pub fn apply_directive(&mut self, directive: Action) -> Action {
        match directive {
            Action::None => {}
            Action::ContinueRead => {
                self.current = if self.previous.is_read() {
                    self.previous
                } else {
                    Action::Read
                };
            }
            other => self.current = other,
        }
        self.current
    }

    pub fn enter_virtual(&mut self) {
        self.previous = self.current;
        self.current = Action::Virtual;
    }

    pub fn clear(&mut self) {
        self.current = Action::None;
        self.previous = Action::None;
    }
}

use std::collections::HashMap;

use tracing::{debug, info, warn};

/// Key under which submitted lines are persisted.
pub const HISTORY_KEY: &str = "history";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Key-value blob store used to keep history across sessions.
pub trait HistoryStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory adapter for tests and hosts without persistence.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistoryStore {
    entries: HashMap<String, String>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Submitted lines plus a recall cursor ranging over `0..=len`.
///
/// Storage failures are logged and ignored; the in-memory log is always
/// authoritative.
pub struct History {
    entries: Vec<String>,
    cursor: usize,
    store: Option<Box<dyn HistoryStore>>,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("entries", &self.entries)
            .field("cursor", &self.cursor)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            store: None,
        }
    }

    pub fn with_entries(entries: Vec<String>) -> Self {
        let cursor = entries.len();
        Self {
            entries,
            cursor,
            store: None,
        }
    }

    /// Loads previously persisted lines from `store` and keeps it for writes.
    pub fn load(store: Box<dyn HistoryStore>) -> Self {
        let entries = match store.get(HISTORY_KEY) {
            Ok(Some(raw)) => {
                debug!(target = "textterm.history", "history retrieved from store");
                decode(&raw)
            }
            Ok(None) => {
                info!(target = "textterm.history", "history not available");
                Vec::new()
            }
            Err(err) => {
                warn!(target = "textterm.history", error = %err, "cannot read history store");
                Vec::new()
            }
        };
        let mut history = Self::with_entries(entries);
        history.store = Some(store);
        history
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Appends a line, persists the log and parks the cursor past the end.
    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
        self.cursor = self.entries.len();
        self.persist();
    }

    /// Moves the cursor back one entry and returns it; `None` at the start.
    pub fn back(&mut self) -> Option<&str> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).map(String::as_str)
    }

    /// Moves the cursor forward; past the end yields an empty line.
    pub fn forward(&mut self) -> &str {
        if self.cursor < self.entries.len() {
            self.cursor += 1;
        }
        self.entries.get(self.cursor).map(String::as_str).unwrap_or("")
    }

    fn persist(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        let encoded = match serde_json::to_string(&self.entries) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(target = "textterm.history", error = %err, "cannot encode history");
                return;
            }
        };
        if let Err(err) = store.set(HISTORY_KEY, &encoded) {
            warn!(target = "textterm.history", error = %err, "cannot update history store");
        }
    }
}

fn decode(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(entries) => entries,
        // comma-joined values written by older clients
        Err(_) if raw.is_empty() => Vec::new(),
        Err(_) => raw.split(',').map(str::to_string).collect(),
    }
}

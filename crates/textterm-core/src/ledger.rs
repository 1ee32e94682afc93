//! Ordered prompt/input pairs forming the visible transcript.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::settings::RegionStyle;

pub type PairId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    /// Open pair accepting edits.
    Editable,
    /// Open pair with editing switched off (virtual or terminal modes).
    Disabled,
    /// Superseded pair; never editable again.
    Frozen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptStyle {
    Normal(RegionStyle),
    /// Host-supplied style tag, e.g. `textterm-error-prompt`.
    Special(String),
}

impl Default for PromptStyle {
    fn default() -> Self {
        PromptStyle::Normal(RegionStyle::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePair {
    id: PairId,
    prompt: String,
    prompt_style: PromptStyle,
    input: String,
    input_style: RegionStyle,
    state: InputState,
    masked: bool,
}

impl LinePair {
    pub fn id(&self) -> PairId {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn prompt_style(&self) -> &PromptStyle {
        &self.prompt_style
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_style(&self) -> &RegionStyle {
        &self.input_style
    }

    pub fn state(&self) -> InputState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != InputState::Frozen
    }

    pub fn is_editable(&self) -> bool {
        self.state == InputState::Editable
    }

    /// Whether the input segment is obscured on the display.
    pub fn is_masked(&self) -> bool {
        self.masked
    }

    /// Frozen pairs with nothing typed render without an input segment.
    pub fn shows_input(&self) -> bool {
        self.is_open() || !self.input.is_empty()
    }
}

/// Append-only sequence of pairs with bookmark rollback.
///
/// The last pair is always the open one; every earlier pair is frozen.
#[derive(Debug, Clone)]
pub struct Ledger {
    pairs: Vec<LinePair>,
    next_id: PairId,
    bookmarks: BTreeMap<String, PairId>,
    current_line: Option<PairId>,
    next_is_current_line: bool,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(PromptStyle::default(), RegionStyle::default())
    }
}

impl Ledger {
    pub fn new(prompt_style: PromptStyle, input_style: RegionStyle) -> Self {
        let first = LinePair {
            id: 0,
            prompt: String::new(),
            prompt_style,
            input: String::new(),
            input_style,
            state: InputState::Editable,
            masked: false,
        };
        Self {
            pairs: vec![first],
            next_id: 1,
            bookmarks: BTreeMap::new(),
            current_line: None,
            next_is_current_line: true,
        }
    }

    pub fn pairs(&self) -> &[LinePair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn active(&self) -> &LinePair {
        self.pairs.last().expect("ledger always holds a pair")
    }

    fn active_mut(&mut self) -> &mut LinePair {
        self.pairs.last_mut().expect("ledger always holds a pair")
    }

    /// Pair the user is composing at, falling back to the active pair.
    pub fn current_line(&self) -> &LinePair {
        self.current_line
            .and_then(|id| self.position(id))
            .map(|idx| &self.pairs[idx])
            .unwrap_or_else(|| self.active())
    }

    fn current_line_mut(&mut self) -> &mut LinePair {
        match self.current_line.and_then(|id| self.position(id)) {
            Some(idx) => &mut self.pairs[idx],
            None => self.active_mut(),
        }
    }

    pub fn position(&self, id: PairId) -> Option<usize> {
        self.pairs.iter().position(|pair| pair.id == id)
    }

    /// The next opened pair becomes the current line.
    pub fn mark_next_as_current_line(&mut self) {
        self.next_is_current_line = true;
    }

    /// Freezes the active pair and appends a fresh editable one.
    pub fn open_pair(
        &mut self,
        prompt: &str,
        prompt_style: PromptStyle,
        input_style: RegionStyle,
    ) -> PairId {
        self.freeze_active();
        let pair = self.new_pair(prompt, prompt_style, input_style);
        let id = pair.id;
        self.pairs.push(pair);
        trace!(target = "textterm.ledger", pair = id, len = self.pairs.len(), "opened pair");
        id
    }

    fn freeze_active(&mut self) {
        let active = self.active_mut();
        active.state = InputState::Frozen;
    }

    fn new_pair(&mut self, prompt: &str, prompt_style: PromptStyle, input_style: RegionStyle) -> LinePair {
        let id = self.next_id;
        self.next_id += 1;
        let masked = self.active().masked;
        if self.next_is_current_line {
            self.next_is_current_line = false;
            self.current_line = Some(id);
        }
        LinePair {
            id,
            prompt: prompt.to_string(),
            prompt_style,
            input: String::new(),
            input_style,
            state: InputState::Editable,
            masked,
        }
    }

    /// Collapses the ledger to its last pair, emptied and editable.
    pub fn reset(&mut self) {
        debug!(target = "textterm.ledger", removed = self.pairs.len() - 1, "resetting transcript");
        let keep = self.pairs.len() - 1;
        self.pairs.drain(..keep);
        let active = self.active_mut();
        active.prompt.clear();
        active.input.clear();
        active.state = InputState::Editable;
    }

    /// Clears the current-line prompt and the active input.
    pub fn reset_line(&mut self) {
        debug!(target = "textterm.ledger", "resetting line");
        self.current_line_mut().prompt.clear();
        self.active_mut().input.clear();
    }

    /// Tags the last pair with `label`, replacing any previous target.
    pub fn set_bookmark(&mut self, label: &str) {
        let id = self.active().id;
        debug!(target = "textterm.ledger", bookmark = label, pair = id, "setting bookmark");
        self.bookmarks.insert(label.to_string(), id);
    }

    pub fn bookmark(&self, label: &str) -> Option<PairId> {
        self.bookmarks.get(label).copied()
    }

    /// Removes the bookmarked pair and everything after it, leaving a fresh
    /// open pair in its place. Every label that pointed into the removed range
    /// is moved to the new pair. Returns `false` (and changes nothing) when the
    /// label or its pair is gone.
    pub fn reset_to_bookmark(
        &mut self,
        label: &str,
        prompt_style: PromptStyle,
        input_style: RegionStyle,
    ) -> bool {
        debug!(target = "textterm.ledger", bookmark = label, "resetting to bookmark");
        let Some(idx) = self.bookmark(label).and_then(|id| self.position(id)) else {
            return false;
        };
        let pair = self.new_pair("", prompt_style, input_style);
        let new_id = pair.id;
        let removed: Vec<PairId> = self.pairs.drain(idx..).map(|p| p.id).collect();
        self.pairs.push(pair);
        for target in self.bookmarks.values_mut() {
            if removed.contains(target) {
                *target = new_id;
            }
        }
        if self.current_line.is_some_and(|id| removed.contains(&id)) {
            self.current_line = None;
        }
        true
    }

    pub fn set_input(&mut self, text: &str) {
        let active = self.active_mut();
        active.input.clear();
        active.input.push_str(text);
    }

    /// Inserts at the end of the open input if it is editable.
    pub fn insert_input(&mut self, text: &str) -> bool {
        let active = self.active_mut();
        if active.state != InputState::Editable {
            return false;
        }
        active.input.push_str(text);
        true
    }

    pub fn delete_input_backward(&mut self) -> bool {
        let active = self.active_mut();
        if active.state != InputState::Editable {
            return false;
        }
        active.input.pop().is_some()
    }

    pub fn append_prompt(&mut self, markup: &str) {
        self.active_mut().prompt.push_str(markup);
    }

    pub fn clear_current_line_prompt(&mut self) {
        self.current_line_mut().prompt.clear();
    }

    pub fn restyle_active_prompt(&mut self, style: PromptStyle) {
        self.active_mut().prompt_style = style;
    }

    pub fn set_editable(&mut self, editable: bool) {
        let active = self.active_mut();
        active.state = if editable {
            InputState::Editable
        } else {
            InputState::Disabled
        };
    }

    pub fn set_masked(&mut self, masked: bool) {
        self.active_mut().masked = masked;
    }

    pub fn editable_count(&self) -> usize {
        self.pairs.iter().filter(|pair| pair.is_editable()).count()
    }
}

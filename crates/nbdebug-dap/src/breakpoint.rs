//! Breakpoint bookkeeping for the session's source cell.

use std::collections::BTreeMap;

/// A client-side breakpoint. Identity is the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// Line number.
    pub line: u32,
    /// Text of the line when the breakpoint was placed.
    pub source_text: String,
    /// Whether the breakpoint is active.
    pub enabled: bool,
}

impl Breakpoint {
    /// Create an enabled breakpoint.
    pub fn new(line: u32, source_text: impl Into<String>) -> Self {
        Self {
            line,
            source_text: source_text.into(),
            enabled: true,
        }
    }
}

/// What a [`BreakpointStore::toggle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// A new breakpoint was inserted.
    Added,
    /// The existing breakpoint was removed.
    Removed,
}

/// Ordered, line-unique set of breakpoints.
///
/// Independent of session state: toggling while a session runs only
/// affects the next handshake.
#[derive(Debug, Clone, Default)]
pub struct BreakpointStore {
    breakpoints: BTreeMap<u32, Breakpoint>,
}

impl BreakpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a breakpoint at `line`, or remove the one already there.
    pub fn toggle(&mut self, line: u32, source_text: impl Into<String>) -> Toggle {
        if self.breakpoints.remove(&line).is_some() {
            Toggle::Removed
        } else {
            self.breakpoints
                .insert(line, Breakpoint::new(line, source_text));
            Toggle::Added
        }
    }

    /// Replace the whole set. Later entries win on duplicate lines.
    pub fn replace(&mut self, breakpoints: impl IntoIterator<Item = Breakpoint>) {
        self.breakpoints = breakpoints
            .into_iter()
            .map(|bp| (bp.line, bp))
            .collect();
    }

    /// Snapshot sorted by line ascending.
    pub fn list(&self) -> Vec<Breakpoint> {
        self.breakpoints.values().cloned().collect()
    }

    /// Whether a breakpoint exists at `line`.
    pub fn contains(&self, line: u32) -> bool {
        self.breakpoints.contains_key(&line)
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Remove every breakpoint.
    pub fn clear(&mut self) {
        self.breakpoints.clear();
    }
}

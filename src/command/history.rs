//! Undoable transaction history.
//!
//! A [HistoryEntry] groups one or more commands applied as a unit. The
//! [History] keeps an entry list plus a cursor; recording truncates the redo
//! tail, undoing applies each command's inverse in reverse order. Because
//! graphs are persistent values and each kernel operation is all-or-nothing,
//! a failed entry leaves the caller's graph untouched: atomicity needs no
//! explicit rollback.

use crate::graph::{Graph, GraphError};

use super::Command;

#[derive(Clone, Debug, PartialEq)]
/// An ordered command group applied atomically, with an optional label for
/// undo menus.
pub struct HistoryEntry {
    /// Commands in application order.
    pub commands: Vec<Command>,
    /// Display label, e.g. "Delete 3 nodes".
    pub label: Option<String>,
}

impl HistoryEntry {
    /// Entry without a label.
    pub fn new(commands: Vec<Command>) -> Self {
        Self {
            commands,
            label: None,
        }
    }

    /// Entry with a display label.
    pub fn labeled(commands: Vec<Command>, label: impl Into<String>) -> Self {
        Self {
            commands,
            label: Some(label.into()),
        }
    }

    /// Whether no command in the entry would change the graph.
    pub fn is_noop(&self) -> bool {
        self.commands.iter().all(Command::is_noop)
    }

    /// Whether the entry contains a command the execution state cares
    /// about; callers mark dirtiness after applying, undoing, or redoing
    /// such entries.
    pub fn affects_execution(&self) -> bool {
        self.commands.iter().any(Command::affects_execution)
    }

    /// Apply all commands in order. Fails without observable effect: the
    /// input graph is never touched.
    pub fn apply(&self, graph: &Graph) -> Result<Graph, GraphError> {
        let mut applied = graph.clone();
        for command in &self.commands {
            applied = command.apply(&applied)?;
        }

        Ok(applied)
    }

    /// The inverse sequence: each command's inverse, in reverse entry order.
    pub fn inverse(&self) -> Vec<Command> {
        self.commands
            .iter()
            .rev()
            .flat_map(Command::inverse)
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
/// Entry list plus cursor. Entries below the cursor are undoable, entries
/// at and above it are redoable.
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl History {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [undo](Self::undo) has anything to do.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Whether [redo](Self::redo) has anything to do.
    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// The entry the next [undo](Self::undo) would revert.
    pub fn entry_to_undo(&self) -> Option<&HistoryEntry> {
        self.cursor.checked_sub(1).map(|index| &self.entries[index])
    }

    /// The entry the next [redo](Self::redo) would re-apply.
    pub fn entry_to_redo(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    /// Apply an entry and push it, discarding any redo tail. On failure the
    /// history and the caller's graph are both unchanged.
    pub fn record(&mut self, graph: &Graph, entry: HistoryEntry) -> Result<Graph, GraphError> {
        let applied = entry.apply(graph)?;

        self.entries.truncate(self.cursor);
        self.entries.push(entry);
        self.cursor += 1;

        Ok(applied)
    }

    /// Revert the entry below the cursor. Returns `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self, graph: &Graph) -> Result<Option<Graph>, GraphError> {
        let Some(entry) = self.entry_to_undo() else {
            return Ok(None);
        };

        let mut reverted = graph.clone();
        for command in entry.inverse() {
            reverted = command.apply(&reverted)?;
        }
        self.cursor -= 1;

        Ok(Some(reverted))
    }

    /// Re-apply the entry at the cursor. Returns `None` when there is
    /// nothing to redo.
    pub fn redo(&mut self, graph: &Graph) -> Result<Option<Graph>, GraphError> {
        let Some(entry) = self.entry_to_redo() else {
            return Ok(None);
        };

        let applied = entry.apply(graph)?;
        self.cursor += 1;

        Ok(Some(applied))
    }
}

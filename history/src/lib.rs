//! Client-local undo/redo history for the board view.
//!
//! Each connected client keeps its own linear stack of snapshots. Nothing here
//! is shared with the server or other clients: undoing only reverts the local
//! view, it never retracts actions already broadcast to peers.
//!
//! Snapshot lists are `Arc<[Value]>`, so consecutive snapshots that did not
//! touch a list share the same allocation instead of copying it on every push.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of entries retained before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 50;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Opaque serialized rendering of the drawing surface (e.g. a PNG data URL).
///
/// Restoring a checkpoint means blitting it back, not re-rasterizing actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checkpoint(pub String);

/// One restorable state of the local board view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub checkpoint: Checkpoint,
    pub actions: Arc<[Value]>,
    pub sticky_notes: Arc<[Value]>,
    pub comments: Arc<[Value]>,
}

impl Snapshot {
    #[must_use]
    pub fn new(checkpoint: Checkpoint, actions: Vec<Value>, sticky_notes: Vec<Value>, comments: Vec<Value>) -> Self {
        Self {
            checkpoint,
            actions: actions.into(),
            sticky_notes: sticky_notes.into(),
            comments: comments.into(),
        }
    }

    /// Derive a snapshot that only replaces the action list; overlays are shared.
    #[must_use]
    pub fn with_actions(&self, checkpoint: Checkpoint, actions: Vec<Value>) -> Self {
        Self {
            checkpoint,
            actions: actions.into(),
            sticky_notes: Arc::clone(&self.sticky_notes),
            comments: Arc::clone(&self.comments),
        }
    }
}

// =============================================================================
// HISTORY STACK
// =============================================================================

/// Bounded, linear undo/redo log.
///
/// `cursor` indexes the entry currently shown. Pushing after an undo drops
/// every entry past the cursor, so there is never more than one redo branch.
#[derive(Debug, Clone)]
pub struct HistoryStack<T> {
    entries: VecDeque<T>,
    cursor: Option<usize>,
    capacity: usize,
}

impl<T> HistoryStack<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a stack retaining at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), cursor: None, capacity }
    }

    /// Record a new checkpoint after the current one.
    pub fn push(&mut self, entry: T) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Step back one entry. Returns the entry to restore, or `None` at the
    /// earliest entry.
    pub fn undo(&mut self) -> Option<&T> {
        let cursor = self.cursor.filter(|c| *c > 0)?;
        self.cursor = Some(cursor - 1);
        self.entries.get(cursor - 1)
    }

    /// Step forward one entry. Returns the entry to restore, or `None` at the
    /// latest entry.
    pub fn redo(&mut self) -> Option<&T> {
        let next = self.cursor? + 1;
        if next >= self.entries.len() {
            return None;
        }
        self.cursor = Some(next);
        self.entries.get(next)
    }

    #[must_use]
    pub fn current(&self) -> Option<&T> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry, e.g. when the board is cleared remotely.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}

impl<T> Default for HistoryStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

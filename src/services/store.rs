//! Board store: in-memory registry of live boards and their passwords.
//!
//! DESIGN
//! ======
//! The store is the only owner of `Board` values. Other components reach a
//! board through `get`/`get_mut` and never keep a reference past the current
//! command, so `remove` can never leave a dangling board behind.
//!
//! Passwords live in a separate map and never leave this module except as a
//! borrowed comparison target for the access guard.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::protocol::ErrorCode;
use crate::state::{Board, BoardId, DEFAULT_TITLE, now_ms};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("board not found: {0}")]
    NotFound(BoardId),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_BOARD_NOT_FOUND",
        }
    }
}

/// Result of a successful create. Never carries the password itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBoard {
    pub id: BoardId,
    pub title: String,
    pub has_password: bool,
}

#[derive(Debug, Default)]
pub struct BoardStore {
    boards: HashMap<BoardId, Board>,
    passwords: HashMap<BoardId, String>,
}

// =============================================================================
// CRUD
// =============================================================================

impl BoardStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty board. Blank titles fall back to the default title and
    /// blank passwords mean "no password".
    pub fn create(&mut self, title: Option<String>, password: Option<String>) -> CreatedBoard {
        self.create_with(BoardId::generate, title, password)
    }

    /// Create a board drawing ids from `next_id` until one is unused.
    pub(crate) fn create_with(
        &mut self,
        mut next_id: impl FnMut() -> BoardId,
        title: Option<String>,
        password: Option<String>,
    ) -> CreatedBoard {
        let id = loop {
            let candidate = next_id();
            if !self.boards.contains_key(&candidate) {
                break candidate;
            }
            warn!(board_id = %candidate, "board id collision; regenerating");
        };

        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_owned());
        let password = password.filter(|p| !p.is_empty());
        let has_password = password.is_some();

        self.boards
            .insert(id.clone(), Board::new(id.clone(), title.clone(), now_ms()));
        if let Some(password) = password {
            self.passwords.insert(id.clone(), password);
        }

        info!(board_id = %id, has_password, "board created");
        CreatedBoard { id, title, has_password }
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no board has this id.
    pub fn get(&self, id: &BoardId) -> Result<&Board, StoreError> {
        self.boards
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no board has this id.
    pub fn get_mut(&mut self, id: &BoardId) -> Result<&mut Board, StoreError> {
        self.boards
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    #[must_use]
    pub fn contains(&self, id: &BoardId) -> bool {
        self.boards.contains_key(id)
    }

    /// Stored password for a board, if it has one.
    pub(crate) fn password(&self, id: &BoardId) -> Option<&str> {
        self.passwords.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn has_password(&self, id: &BoardId) -> bool {
        self.passwords.contains_key(id)
    }

    /// Mark the board as active now and hand it back for mutation. The only
    /// writer of `last_activity`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no board has this id.
    pub fn touch(&mut self, id: &BoardId) -> Result<&mut Board, StoreError> {
        let board = self.get_mut(id)?;
        board.last_activity = now_ms();
        Ok(board)
    }

    /// Delete a board and its password. Returns whether anything was removed.
    pub fn remove(&mut self, id: &BoardId) -> bool {
        self.passwords.remove(id);
        self.boards.remove(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// Drop every board, used on shutdown.
    pub fn clear(&mut self) {
        self.boards.clear();
        self.passwords.clear();
    }
}

// =============================================================================
// EXPIRY
// =============================================================================

impl BoardStore {
    /// Ids of boards whose last activity is more than `ttl_ms` before `now`.
    #[must_use]
    pub fn idle_boards(&self, now: i64, ttl_ms: i64) -> Vec<BoardId> {
        self.boards
            .values()
            .filter(|board| now.saturating_sub(board.last_activity) > ttl_ms)
            .map(|board| board.id.clone())
            .collect()
    }

    /// Remove every idle board and return the evicted ids.
    pub fn remove_idle(&mut self, now: i64, ttl_ms: i64) -> Vec<BoardId> {
        let idle = self.idle_boards(now, ttl_ms);
        for id in &idle {
            self.remove(id);
        }
        idle
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

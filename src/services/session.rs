//! Session registry: connection lifecycle, join handshake, ownership.
//!
//! LIFECYCLE
//! =========
//! Each connection moves `Unjoined → Joined → Closed` and never back. A
//! reconnect is a brand-new session. Only `Unjoined` and `Joined` sessions
//! are held in the registry; anything else reads as `Closed`.
//!
//! OWNERSHIP
//! =========
//! The first user to join an ownerless board becomes owner. When the owner
//! leaves, ownership passes to the earliest-joined remaining user, or the
//! board becomes ownerless if nobody is left.

use std::collections::HashMap;

use tracing::info;

use crate::protocol::{ErrorCode, JoinBoard, ServerEvent};
use crate::services::access::{self, AccessError};
use crate::services::broadcast::Delivery;
use crate::services::store::{BoardStore, StoreError};
use crate::state::{BoardId, OverlayId, SessionId};

// =============================================================================
// TYPES
// =============================================================================

/// Every recoverable failure reported back to a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("board not found: {0}")]
    BoardNotFound(BoardId),
    #[error("invalid password")]
    InvalidPassword,
    #[error("only the board owner can {0}")]
    NotOwner(&'static str),
    #[error("not joined to board {0}")]
    Unjoined(BoardId),
    #[error("sticky note not found: {0}")]
    NoteNotFound(OverlayId),
    #[error("comment not found: {0}")]
    CommentNotFound(OverlayId),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BoardNotFound(_) => "E_BOARD_NOT_FOUND",
            Self::InvalidPassword => "E_INVALID_PASSWORD",
            Self::NotOwner(_) => "E_NOT_OWNER",
            Self::Unjoined(_) => "E_UNJOINED",
            Self::NoteNotFound(_) => "E_NOTE_NOT_FOUND",
            Self::CommentNotFound(_) => "E_COMMENT_NOT_FOUND",
        }
    }
}

impl From<AccessError> for SessionError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound(id) => Self::BoardNotFound(id),
            AccessError::InvalidPassword => Self::InvalidPassword,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::BoardNotFound(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined(BoardId),
    Closed,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionState>,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh connection in the `Unjoined` state.
    pub fn open(&mut self, session: SessionId) {
        self.sessions.insert(session, SessionState::Unjoined);
    }

    #[must_use]
    pub fn state(&self, session: SessionId) -> SessionState {
        self.sessions
            .get(&session)
            .cloned()
            .unwrap_or(SessionState::Closed)
    }

    #[must_use]
    pub fn is_open(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Ensure `session` is joined to `board_id` before it may act on it.
    ///
    /// # Errors
    ///
    /// Returns `Unjoined` otherwise.
    pub fn require_joined(&self, session: SessionId, board_id: &BoardId) -> Result<(), SessionError> {
        match self.sessions.get(&session) {
            Some(SessionState::Joined(joined)) if joined == board_id => Ok(()),
            _ => Err(SessionError::Unjoined(board_id.clone())),
        }
    }

    /// Forget every session, used on shutdown.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

// =============================================================================
// JOIN / DISCONNECT
// =============================================================================

impl SessionRegistry {
    /// Join handshake. On success the sender gets `owner-status` (when it
    /// becomes owner) and the full `board-init` snapshot, then everyone on the
    /// board, sender included, gets the new `users-update`.
    ///
    /// A session already on another board leaves it first. Re-joining the
    /// same board takes the new name and color, then re-sends the snapshot
    /// and user list.
    ///
    /// # Errors
    ///
    /// `BoardNotFound` or `InvalidPassword`; the session state is unchanged.
    pub fn join(&mut self, store: &mut BoardStore, session: SessionId, request: JoinBoard) -> Result<Vec<Delivery>, SessionError> {
        let current = match self.state(session) {
            SessionState::Closed => return Ok(Vec::new()),
            SessionState::Unjoined => None,
            SessionState::Joined(board_id) => Some(board_id),
        };

        let JoinBoard { board_id, user, password } = request;
        access::check_join(store, &board_id, password.as_deref())?;

        if current.as_ref() == Some(&board_id) {
            let board = store.touch(&board_id)?;
            board.presence.rename(session, user);
            return Ok(vec![
                Delivery::Reply(ServerEvent::BoardInit { board: board.snapshot(), is_owner: board.is_owner(session) }),
                Delivery::Broadcast(board_id, ServerEvent::UsersUpdate(board.presence.users())),
            ]);
        }

        let mut deliveries = match &current {
            Some(previous) => leave(store, session, previous),
            None => Vec::new(),
        };

        let board = store.touch(&board_id)?;
        let joined_at = board.last_activity;
        let name = board.presence.add(session, user, joined_at).name.clone();

        if board.owner.is_none() {
            board.owner = Some(session);
            deliveries.push(Delivery::Reply(ServerEvent::OwnerStatus { is_owner: true }));
        }

        deliveries.push(Delivery::Reply(ServerEvent::BoardInit {
            board: board.snapshot(),
            is_owner: board.is_owner(session),
        }));
        deliveries.push(Delivery::Broadcast(board_id.clone(), ServerEvent::UsersUpdate(board.presence.users())));

        info!(%board_id, %session, %name, users = board.presence.len(), "user joined board");
        self.sessions.insert(session, SessionState::Joined(board_id));
        Ok(deliveries)
    }

    /// Close a connection. A session that never joined closes silently;
    /// a joined one leaves its board, handing ownership on if needed.
    pub fn disconnect(&mut self, store: &mut BoardStore, session: SessionId) -> Vec<Delivery> {
        match self.sessions.remove(&session) {
            Some(SessionState::Joined(board_id)) => leave(store, session, &board_id),
            _ => Vec::new(),
        }
    }
}

/// Remove `session` from a board and compute the resulting notifications.
fn leave(store: &mut BoardStore, session: SessionId, board_id: &BoardId) -> Vec<Delivery> {
    let on_board = store
        .get_mut(board_id)
        .is_ok_and(|board| board.presence.remove(session).is_some());
    if !on_board {
        return Vec::new();
    }
    let Ok(board) = store.touch(board_id) else {
        return Vec::new();
    };

    let mut deliveries = Vec::new();
    if board.is_owner(session) {
        board.owner = board.presence.earliest();
        if let Some(new_owner) = board.owner {
            info!(%board_id, from = %session, to = %new_owner, "ownership transferred");
            deliveries.push(Delivery::Notify(new_owner, ServerEvent::OwnerStatus { is_owner: true }));
        }
    }
    deliveries.push(Delivery::Broadcast(board_id.clone(), ServerEvent::UsersUpdate(board.presence.users())));

    info!(%board_id, %session, remaining = board.presence.len(), "user left board");
    deliveries
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

//! Realtime wire protocol: one JSON text frame per event.
//!
//! ARCHITECTURE
//! ============
//! Every websocket message is `{"event": "<name>", "data": <payload>}`.
//! Inbound frames decode into one `ClientEvent` variant per client event;
//! the hub resolves each variant to a state transition and answers with
//! `ServerEvent`s addressed to the sender, one peer, or the whole board.
//!
//! DESIGN
//! ======
//! - Event names are kebab-case, payload fields camelCase, matching what
//!   browser clients already speak.
//! - Errors are terminal for the request only. They go to the originating
//!   connection as `error {code, message}` and never close the socket.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::{
    Action, BoardId, BoardSnapshot, Cursor, DisplayUser, Overlay, OverlayId, RawAction, SessionId, Settings, User,
};

/// Error code for frames that fail to decode.
pub const E_INVALID_MESSAGE: &str = "E_INVALID_MESSAGE";

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured error events.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// CLIENT → SERVER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBoard {
    pub board_id: BoardId,
    #[serde(default)]
    pub user: DisplayUser,
    #[serde(default)]
    pub password: Option<String>,
}

/// Replacement content for an existing sticky note.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotePatch {
    pub id: OverlayId,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinBoard(JoinBoard),
    #[serde(rename_all = "camelCase")]
    DrawAction { board_id: BoardId, action: RawAction },
    #[serde(rename_all = "camelCase")]
    CursorMove { board_id: BoardId, cursor: Cursor },
    #[serde(rename_all = "camelCase")]
    ClearBoard { board_id: BoardId },
    #[serde(rename_all = "camelCase")]
    UpdateBoardSettings { board_id: BoardId, settings: Settings },
    #[serde(rename_all = "camelCase")]
    AddStickyNote { board_id: BoardId, note: Map<String, Value> },
    #[serde(rename_all = "camelCase")]
    UpdateStickyNote { board_id: BoardId, note: NotePatch },
    #[serde(rename_all = "camelCase")]
    DeleteStickyNote { board_id: BoardId, note_id: OverlayId },
    #[serde(rename_all = "camelCase")]
    AddComment { board_id: BoardId, comment: Map<String, Value> },
    #[serde(rename_all = "camelCase")]
    DeleteComment { board_id: BoardId, comment_id: OverlayId },
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinBoard(_) => "join-board",
            Self::DrawAction { .. } => "draw-action",
            Self::CursorMove { .. } => "cursor-move",
            Self::ClearBoard { .. } => "clear-board",
            Self::UpdateBoardSettings { .. } => "update-board-settings",
            Self::AddStickyNote { .. } => "add-sticky-note",
            Self::UpdateStickyNote { .. } => "update-sticky-note",
            Self::DeleteStickyNote { .. } => "delete-sticky-note",
            Self::AddComment { .. } => "add-comment",
            Self::DeleteComment { .. } => "delete-comment",
        }
    }

    /// Board the event addresses.
    #[must_use]
    pub fn board_id(&self) -> &BoardId {
        match self {
            Self::JoinBoard(join) => &join.board_id,
            Self::DrawAction { board_id, .. }
            | Self::CursorMove { board_id, .. }
            | Self::ClearBoard { board_id }
            | Self::UpdateBoardSettings { board_id, .. }
            | Self::AddStickyNote { board_id, .. }
            | Self::UpdateStickyNote { board_id, .. }
            | Self::DeleteStickyNote { board_id, .. }
            | Self::AddComment { board_id, .. }
            | Self::DeleteComment { board_id, .. } => board_id,
        }
    }

    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the frame is not a known event.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

// =============================================================================
// SERVER → CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Connected { session_id: SessionId },
    #[serde(rename_all = "camelCase")]
    BoardInit { board: BoardSnapshot, is_owner: bool },
    UsersUpdate(Vec<User>),
    #[serde(rename_all = "camelCase")]
    OwnerStatus { is_owner: bool },
    DrawAction(Action),
    #[serde(rename_all = "camelCase")]
    CursorUpdate { user_id: SessionId, user: User, cursor: Cursor },
    BoardCleared,
    SettingsUpdate(Settings),
    StickyNoteAdded(Overlay),
    StickyNoteUpdated(Overlay),
    StickyNoteDeleted { id: OverlayId },
    CommentAdded(Overlay),
    CommentDeleted { id: OverlayId },
    Error { code: String, message: String },
}

impl ServerEvent {
    /// Build an error event from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error { code: err.error_code().to_owned(), message: err.to_string() }
    }

    /// Build an error event from a code and free-form message.
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error { code: code.to_owned(), message: message.into() }
    }

    /// Wire name of the event, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::BoardInit { .. } => "board-init",
            Self::UsersUpdate(_) => "users-update",
            Self::OwnerStatus { .. } => "owner-status",
            Self::DrawAction(_) => "draw-action",
            Self::CursorUpdate { .. } => "cursor-update",
            Self::BoardCleared => "board-cleared",
            Self::SettingsUpdate(_) => "settings-update",
            Self::StickyNoteAdded(_) => "sticky-note-added",
            Self::StickyNoteUpdated(_) => "sticky-note-updated",
            Self::StickyNoteDeleted { .. } => "sticky-note-deleted",
            Self::CommentAdded(_) => "comment-added",
            Self::CommentDeleted { .. } => "comment-deleted",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize to the JSON text frame sent over the socket.
    ///
    /// # Errors
    ///
    /// Returns the serde error if a payload cannot be encoded.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;

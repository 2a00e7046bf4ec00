//! Action log: append-only drawing log plus sticky-note and comment overlays.
//!
//! DESIGN
//! ======
//! Functions here mutate one board and return what changed; the hub decides
//! who hears about it. Every successful mutation marks the board active via
//! `BoardStore::touch`; rejected requests leave it untouched.
//!
//! Drawing actions get a server-assigned id. Notes and comments keep the id
//! the client chose when it is present and unused, so the originating client
//! (which never receives its own echo) can address them later.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::protocol::NotePatch;
use crate::services::session::SessionError;
use crate::services::store::BoardStore;
use crate::state::{Action, BoardId, Overlay, OverlayId, RawAction, SessionId, Settings, strip_reserved};

pub const STICKY_NOTE_KIND: &str = "sticky-note";
pub const COMMENT_KIND: &str = "comment";

/// Settings key that also renames the board.
const TITLE_KEY: &str = "title";

// =============================================================================
// DRAWING
// =============================================================================

/// Stamp and append a drawing action.
///
/// # Errors
///
/// `BoardNotFound` if the board is gone.
pub fn append(store: &mut BoardStore, board_id: &BoardId, session: SessionId, raw: RawAction) -> Result<Action, SessionError> {
    let board = store.touch(board_id)?;
    let action = raw.stamp(session, board.last_activity);
    board.actions.push(action.clone());
    Ok(action)
}

/// Empty the drawing log and both overlays. Owner only.
///
/// # Errors
///
/// `NotOwner` if `requester` is not the owner; nothing changes in that case.
pub fn clear(store: &mut BoardStore, board_id: &BoardId, requester: SessionId) -> Result<(), SessionError> {
    require_owner(store, board_id, requester, "clear the board")?;
    let board = store.touch(board_id)?;
    board.actions.clear();
    board.sticky_notes.clear();
    board.comments.clear();
    Ok(())
}

/// Shallow-merge `partial` into the board settings and return the result.
/// A string `title` also renames the board. Owner only.
///
/// # Errors
///
/// `NotOwner` if `requester` is not the owner; nothing changes in that case.
pub fn update_settings(
    store: &mut BoardStore,
    board_id: &BoardId,
    requester: SessionId,
    partial: Settings,
) -> Result<Settings, SessionError> {
    require_owner(store, board_id, requester, "update board settings")?;
    let board = store.touch(board_id)?;
    if let Some(title) = partial.get(TITLE_KEY).and_then(Value::as_str) {
        if !title.trim().is_empty() {
            board.title = title.to_owned();
        }
    }
    for (key, value) in partial {
        board.settings.insert(key, value);
    }
    Ok(board.settings.clone())
}

fn require_owner(store: &BoardStore, board_id: &BoardId, requester: SessionId, op: &'static str) -> Result<(), SessionError> {
    if store.get(board_id)?.is_owner(requester) {
        Ok(())
    } else {
        Err(SessionError::NotOwner(op))
    }
}

// =============================================================================
// STICKY NOTES
// =============================================================================

/// # Errors
///
/// `BoardNotFound` if the board is gone.
pub fn add_sticky_note(
    store: &mut BoardStore,
    board_id: &BoardId,
    session: SessionId,
    note: Map<String, Value>,
) -> Result<Overlay, SessionError> {
    let board = store.touch(board_id)?;
    let note = overlay_entry(&board.sticky_notes, STICKY_NOTE_KIND, note, session, board.last_activity);
    board.sticky_notes.insert(note.id.clone(), note.clone());
    Ok(note)
}

/// Replace a note's content. Id, kind and author are kept; the timestamp is
/// restamped.
///
/// # Errors
///
/// `NoteNotFound` if no note has this id.
pub fn update_sticky_note(store: &mut BoardStore, board_id: &BoardId, patch: NotePatch) -> Result<Overlay, SessionError> {
    if !store.get(board_id)?.sticky_notes.contains_key(&patch.id) {
        return Err(SessionError::NoteNotFound(patch.id));
    }
    let board = store.touch(board_id)?;
    let now = board.last_activity;
    let note = board
        .sticky_notes
        .get_mut(&patch.id)
        .ok_or(SessionError::NoteNotFound(patch.id))?;
    note.payload = strip_reserved(patch.payload);
    note.timestamp = now;
    Ok(note.clone())
}

/// # Errors
///
/// `NoteNotFound` if no note has this id.
pub fn delete_sticky_note(store: &mut BoardStore, board_id: &BoardId, note_id: &OverlayId) -> Result<(), SessionError> {
    if store.get_mut(board_id)?.sticky_notes.shift_remove(note_id).is_none() {
        return Err(SessionError::NoteNotFound(note_id.clone()));
    }
    store.touch(board_id)?;
    Ok(())
}

// =============================================================================
// COMMENTS
// =============================================================================

/// # Errors
///
/// `BoardNotFound` if the board is gone.
pub fn add_comment(
    store: &mut BoardStore,
    board_id: &BoardId,
    session: SessionId,
    comment: Map<String, Value>,
) -> Result<Overlay, SessionError> {
    let board = store.touch(board_id)?;
    let comment = overlay_entry(&board.comments, COMMENT_KIND, comment, session, board.last_activity);
    board.comments.insert(comment.id.clone(), comment.clone());
    Ok(comment)
}

/// # Errors
///
/// `CommentNotFound` if no comment has this id.
pub fn delete_comment(store: &mut BoardStore, board_id: &BoardId, comment_id: &OverlayId) -> Result<(), SessionError> {
    if store.get_mut(board_id)?.comments.shift_remove(comment_id).is_none() {
        return Err(SessionError::CommentNotFound(comment_id.clone()));
    }
    store.touch(board_id)?;
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

/// Build an overlay entry, keeping the client's id unless it is missing or
/// already taken.
fn overlay_entry(
    existing: &IndexMap<OverlayId, Overlay>,
    kind: &str,
    payload: Map<String, Value>,
    session: SessionId,
    now: i64,
) -> Overlay {
    let id = payload
        .get("id")
        .and_then(OverlayId::from_value)
        .filter(|id| !existing.contains_key(id))
        .unwrap_or_else(OverlayId::generate);
    Overlay { id, kind: kind.to_owned(), payload: strip_reserved(payload), timestamp: now, user_id: session }
}

#[cfg(test)]
#[path = "action_test.rs"]
mod tests;

//! Access guard: optional per-board password check at join time.
//!
//! The comparison is byte-for-byte with no hashing or normalization.
//! A board without a password admits any (or no) supplied password.

use crate::protocol::ErrorCode;
use crate::services::store::BoardStore;
use crate::state::BoardId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("board not found: {0}")]
    NotFound(BoardId),
    #[error("invalid password")]
    InvalidPassword,
}

impl ErrorCode for AccessError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_BOARD_NOT_FOUND",
            Self::InvalidPassword => "E_INVALID_PASSWORD",
        }
    }
}

/// Decide whether `supplied` grants entry to `board_id`.
///
/// # Errors
///
/// `NotFound` if the board does not exist, `InvalidPassword` if the board is
/// protected and `supplied` is not an exact match.
pub fn check_join(store: &BoardStore, board_id: &BoardId, supplied: Option<&str>) -> Result<(), AccessError> {
    if !store.contains(board_id) {
        return Err(AccessError::NotFound(board_id.clone()));
    }
    match store.password(board_id) {
        None => Ok(()),
        Some(stored) if supplied.is_some_and(|s| s.as_bytes() == stored.as_bytes()) => Ok(()),
        Some(_) => Err(AccessError::InvalidPassword),
    }
}

//! Presence tracker: who is connected to a board and where their cursor is.
//!
//! DESIGN
//! ======
//! Users are kept in join order, so "the earliest remaining user" is simply
//! the first entry. Ownership transfer relies on that for a deterministic
//! successor. Cursor moves are stored but never count as board activity.

use indexmap::IndexMap;

use crate::state::{Cursor, DisplayUser, SessionId, User};

#[derive(Debug, Default)]
pub struct Presence {
    users: IndexMap<SessionId, User>,
}

impl Presence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection as a user on this board.
    pub fn add(&mut self, session: SessionId, display: DisplayUser, now: i64) -> &User {
        let user = User {
            id: session,
            name: display.name,
            color: display.color,
            cursor: Cursor::default(),
            joined_at: now,
        };
        self.users.shift_remove(&session);
        &*self.users.entry(session).or_insert(user)
    }

    /// Remove a user, preserving the join order of the rest.
    pub fn remove(&mut self, session: SessionId) -> Option<User> {
        self.users.shift_remove(&session)
    }

    /// Store a new cursor position and return the updated user.
    /// Coordinates are passed through unvalidated.
    pub fn set_cursor(&mut self, session: SessionId, cursor: Cursor) -> Option<&User> {
        let user = self.users.get_mut(&session)?;
        user.cursor = cursor;
        Some(&*user)
    }

    /// Replace the name and color of a user already on the board, keeping
    /// its join order and cursor.
    pub fn rename(&mut self, session: SessionId, display: DisplayUser) -> Option<&User> {
        let user = self.users.get_mut(&session)?;
        user.name = display.name;
        user.color = display.color;
        Some(&*user)
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, session: SessionId) -> Option<&User> {
        self.users.get(&session)
    }

    #[cfg(test)]
    #[must_use]
    pub fn contains(&self, session: SessionId) -> bool {
        self.users.contains_key(&session)
    }

    /// Earliest-joined user still present.
    #[must_use]
    pub fn earliest(&self) -> Option<SessionId> {
        self.users.keys().next().copied()
    }

    pub fn sessions(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.users.keys().copied()
    }

    /// User list as broadcast in `users-update`.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

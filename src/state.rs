//! Shared application state and board data model.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds a handle to the hub actor, which exclusively owns every `Board`.
//! Handlers never touch boards directly; they send commands to the hub.

use std::fmt::{self, Write};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::services::hub::HubHandle;
use crate::services::presence::Presence;

/// Title given to boards created without one.
pub const DEFAULT_TITLE: &str = "Untitled Board";

/// Payload keys the server stamps itself and never accepts from a client.
const RESERVED_KEYS: [&str; 4] = ["id", "type", "timestamp", "userId"];

/// Board settings: an open key/value record merged shallowly on update.
pub type Settings = Map<String, Value>;

/// Current time as milliseconds since Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque identity of one live connection. A reconnect always gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Short board identifier handed out at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(String);

impl BoardId {
    /// Generate 12 lowercase hex characters from 6 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 6] = rand::rng().random();
        let mut s = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            let _ = write!(s, "{b:02x}");
        }
        Self(s)
    }

}

impl From<String> for BoardId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for BoardId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// USER
// =============================================================================

/// Pointer position in board coordinates. Never clamped here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
}

/// Display identity chosen by the client at join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayUser {
    pub name: String,
    pub color: String,
}

impl Default for DisplayUser {
    fn default() -> Self {
        Self { name: "Anonymous".into(), color: "#8a8178".into() }
    }
}

/// A connected participant. Lives exactly as long as its connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: SessionId,
    pub name: String,
    pub color: String,
    pub cursor: Cursor,
    pub joined_at: i64,
}

// =============================================================================
// ACTION
// =============================================================================

/// One immutable board mutation as stored in the log and broadcast to peers.
///
/// `payload` is opaque geometry/style data forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub timestamp: i64,
    #[serde(rename = "userId")]
    pub user_id: SessionId,
}

/// Action as submitted by a client, before the server stamps it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl RawAction {
    #[cfg(test)]
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self { kind: kind.into(), payload }
    }

    /// Assign server-side identity. Client-supplied `id`, `timestamp` and
    /// `userId` are discarded.
    #[must_use]
    pub fn stamp(self, user_id: SessionId, timestamp: i64) -> Action {
        Action {
            id: Uuid::new_v4(),
            kind: self.kind,
            payload: strip_reserved(self.payload),
            timestamp,
            user_id,
        }
    }
}

/// Remove keys the server owns from a client payload.
#[must_use]
pub fn strip_reserved(mut payload: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        payload.remove(key);
    }
    payload
}

// =============================================================================
// OVERLAYS
// =============================================================================

/// Id of a sticky note or comment. Clients choose these (often a millisecond
/// timestamp), so JSON numbers and strings are both accepted and echoed back
/// in the form they arrived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverlayId {
    Number(Number),
    Text(String),
}

impl OverlayId {
    /// Fresh server-assigned id.
    #[must_use]
    pub fn generate() -> Self {
        Self::Text(Uuid::new_v4().to_string())
    }

    /// Read a client-supplied id. Empty strings and non-scalar values count
    /// as absent.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self::Number(n.clone())),
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<&str> for OverlayId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<u64> for OverlayId {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => fmt::Display::fmt(n, f),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A sticky note or comment layered over the drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub id: OverlayId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub timestamp: i64,
    #[serde(rename = "userId")]
    pub user_id: SessionId,
}

// =============================================================================
// BOARD
// =============================================================================

/// A live collaborative board. Owned exclusively by the `BoardStore`.
#[derive(Debug)]
pub struct Board {
    pub id: BoardId,
    pub title: String,
    /// Drawing log in append (and broadcast) order.
    pub actions: Vec<Action>,
    pub sticky_notes: IndexMap<OverlayId, Overlay>,
    pub comments: IndexMap<OverlayId, Overlay>,
    pub presence: Presence,
    /// Connection allowed to clear the board and change settings.
    /// Always a key of `presence` when set.
    pub owner: Option<SessionId>,
    pub settings: Settings,
    pub created_at: i64,
    pub last_activity: i64,
}

impl Board {
    #[must_use]
    pub fn new(id: BoardId, title: String, now: i64) -> Self {
        Self {
            id,
            title,
            actions: Vec::new(),
            sticky_notes: IndexMap::new(),
            comments: IndexMap::new(),
            presence: Presence::new(),
            owner: None,
            settings: default_settings(),
            created_at: now,
            last_activity: now,
        }
    }

    #[must_use]
    pub fn is_owner(&self, session: SessionId) -> bool {
        self.owner == Some(session)
    }

    /// Full replay state sent to a joining connection.
    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            id: self.id.clone(),
            title: self.title.clone(),
            data: self.actions.clone(),
            settings: self.settings.clone(),
            sticky_notes: self.sticky_notes.values().cloned().collect(),
            comments: self.comments.values().cloned().collect(),
        }
    }
}

#[must_use]
pub fn default_settings() -> Settings {
    let mut settings = Settings::new();
    settings.insert("background".into(), Value::String("#ffffff".into()));
    settings.insert("gridEnabled".into(), Value::Bool(true));
    settings
}

/// Board content as delivered in `board-init`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub id: BoardId,
    pub title: String,
    pub data: Vec<Action>,
    pub settings: Settings,
    pub sticky_notes: Vec<Overlay>,
    pub comments: Vec<Overlay>,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(hub: HubHandle, config: Arc<Config>) -> Self {
        Self { hub, config }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

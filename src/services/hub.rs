//! Hub: the single-writer actor that owns every board.
//!
//! ARCHITECTURE
//! ============
//! HTTP handlers, websocket connections and the reaper talk to the hub by
//! sending `Command`s over one bounded channel. The hub task handles them
//! strictly one at a time, so each handler body runs to completion against
//! the store without locks, and all broadcasts for a board leave through one
//! dispatch point in append order.
//!
//! Handler functions are pure state transitions that return `Delivery`
//! lists; `Hub::dispatch` owns all outbound concerns.

use std::ops::ControlFlow;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::{ClientEvent, ErrorCode, ServerEvent};
use crate::services::action;
use crate::services::broadcast::{BroadcastRouter, Delivery, Outbox};
use crate::services::session::{SessionError, SessionRegistry};
use crate::services::store::{BoardStore, CreatedBoard};
use crate::state::{Action, BoardId, Cursor, Overlay, SessionId, Settings, now_ms};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("board hub is not running")]
    Unavailable,
}

impl ErrorCode for HubError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Session(err) => err.error_code(),
            Self::Unavailable => "E_UNAVAILABLE",
        }
    }
}

/// Board metadata as returned by `GET /api/board/:id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub id: BoardId,
    pub title: String,
    pub data: Vec<Action>,
    pub settings: Settings,
    pub sticky_notes: Vec<Overlay>,
    pub comments: Vec<Overlay>,
    pub has_password: bool,
    pub user_count: usize,
    pub created_at: i64,
    pub last_activity: i64,
}

/// One unit of work for the hub. Request/response commands carry a reply slot.
#[derive(Debug)]
pub enum Command {
    CreateBoard { title: Option<String>, password: Option<String>, reply: oneshot::Sender<CreatedBoard> },
    GetBoard { board_id: BoardId, reply: oneshot::Sender<Result<BoardSummary, SessionError>> },
    CheckJoin { board_id: BoardId, password: Option<String>, reply: oneshot::Sender<Result<(), SessionError>> },
    Connect { session: SessionId, outbox: Outbox },
    Event { session: SessionId, event: ClientEvent },
    Disconnect { session: SessionId },
    Reap { now: i64, ttl: Duration, reply: oneshot::Sender<Vec<BoardId>> },
    Shutdown,
}

// =============================================================================
// HUB
// =============================================================================

#[derive(Debug)]
pub struct Hub {
    store: BoardStore,
    sessions: SessionRegistry,
    router: BroadcastRouter,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self { store: BoardStore::new(), sessions: SessionRegistry::new(), router: BroadcastRouter::new() }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &BoardStore {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut BoardStore {
        &mut self.store
    }

    /// Handle one command to completion.
    pub fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::CreateBoard { title, password, reply } => {
                let _ = reply.send(self.create_board(title, password));
            }
            Command::GetBoard { board_id, reply } => {
                let _ = reply.send(self.board_summary(&board_id));
            }
            Command::CheckJoin { board_id, password, reply } => {
                let _ = reply.send(self.check_join(&board_id, password.as_deref()));
            }
            Command::Connect { session, outbox } => self.connect(session, outbox),
            Command::Event { session, event } => self.dispatch(session, event),
            Command::Disconnect { session } => self.disconnect(session),
            Command::Reap { now, ttl, reply } => {
                let _ = reply.send(self.reap(now, ttl));
            }
            Command::Shutdown => {
                self.shutdown();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub fn create_board(&mut self, title: Option<String>, password: Option<String>) -> CreatedBoard {
        self.store.create(title, password)
    }

    /// # Errors
    ///
    /// `BoardNotFound` if no board has this id.
    pub fn board_summary(&self, board_id: &BoardId) -> Result<BoardSummary, SessionError> {
        let board = self.store.get(board_id)?;
        let snapshot = board.snapshot();
        Ok(BoardSummary {
            id: snapshot.id,
            title: snapshot.title,
            data: snapshot.data,
            settings: snapshot.settings,
            sticky_notes: snapshot.sticky_notes,
            comments: snapshot.comments,
            has_password: self.store.has_password(board_id),
            user_count: board.presence.len(),
            created_at: board.created_at,
            last_activity: board.last_activity,
        })
    }

    /// # Errors
    ///
    /// `BoardNotFound` or `InvalidPassword`.
    pub fn check_join(&self, board_id: &BoardId, password: Option<&str>) -> Result<(), SessionError> {
        crate::services::access::check_join(&self.store, board_id, password)?;
        Ok(())
    }

    /// Register a new connection and greet it with its session id.
    pub fn connect(&mut self, session: SessionId, outbox: Outbox) {
        self.sessions.open(session);
        self.router.register(session, outbox);
        self.router.send(session, ServerEvent::Connected { session_id: session });
        debug!(%session, connections = self.router.len(), "hub: session opened");
    }

    /// Close a connection: leave its board, then stop delivering to it.
    pub fn disconnect(&mut self, session: SessionId) {
        let deliveries = self.sessions.disconnect(&mut self.store, session);
        self.router.unregister(session);
        self.router.deliver(&self.store, session, deliveries);
        debug!(%session, connections = self.router.len(), "hub: session closed");
    }

    /// Resolve one client event and deliver the outcome. Errors go back to the
    /// sender only.
    pub fn dispatch(&mut self, session: SessionId, event: ClientEvent) {
        if !self.sessions.is_open(session) {
            debug!(%session, event = event.name(), "hub: event from closed session ignored");
            return;
        }

        let name = event.name();
        let result = match event {
            ClientEvent::CursorMove { board_id, cursor } => {
                // Cursor traffic from unjoined sessions is dropped without reply.
                if self.sessions.require_joined(session, &board_id).is_err() {
                    return;
                }
                self.handle_cursor(session, board_id, cursor)
            }
            ClientEvent::JoinBoard(request) => self.sessions.join(&mut self.store, session, request),
            event => self.handle_board_event(session, event),
        };

        match result {
            Ok(deliveries) => self.router.deliver(&self.store, session, deliveries),
            Err(err) => {
                warn!(%session, event = name, code = err.error_code(), error = %err, "hub: request rejected");
                self.router.send(session, ServerEvent::error_from(&err));
            }
        }
    }

    /// Evict boards idle for longer than `ttl`.
    pub fn reap(&mut self, now: i64, ttl: Duration) -> Vec<BoardId> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let evicted = self.store.remove_idle(now, ttl_ms);
        for board_id in &evicted {
            info!(%board_id, "reaped idle board");
        }
        evicted
    }

    /// Drop all boards and connections.
    pub fn shutdown(&mut self) {
        info!(boards = self.store.len(), sessions = self.sessions.len(), "hub shutting down");
        self.router.clear();
        self.sessions.clear();
        self.store.clear();
    }
}

// =============================================================================
// EVENT HANDLERS
// =============================================================================

impl Hub {
    fn handle_cursor(&mut self, session: SessionId, board_id: BoardId, cursor: Cursor) -> Result<Vec<Delivery>, SessionError> {
        let board = self.store.get_mut(&board_id)?;
        let Some(user) = board.presence.set_cursor(session, cursor) else {
            return Ok(Vec::new());
        };
        let event = ServerEvent::CursorUpdate { user_id: session, user: user.clone(), cursor };
        Ok(vec![Delivery::BroadcastExcludeSender(board_id, event)])
    }

    /// Board-scoped mutations. The sender must be joined to the board.
    fn handle_board_event(&mut self, session: SessionId, event: ClientEvent) -> Result<Vec<Delivery>, SessionError> {
        let board_id = event.board_id().clone();
        self.sessions.require_joined(session, &board_id)?;
        let store = &mut self.store;

        let delivery = match event {
            ClientEvent::DrawAction { action, .. } => {
                let action = action::append(store, &board_id, session, action)?;
                debug!(%board_id, %session, id = %action.id, kind = %action.kind, "action appended");
                Delivery::BroadcastExcludeSender(board_id, ServerEvent::DrawAction(action))
            }
            ClientEvent::ClearBoard { .. } => {
                action::clear(store, &board_id, session)?;
                info!(%board_id, %session, "board cleared");
                Delivery::Broadcast(board_id, ServerEvent::BoardCleared)
            }
            ClientEvent::UpdateBoardSettings { settings, .. } => {
                let merged = action::update_settings(store, &board_id, session, settings)?;
                Delivery::Broadcast(board_id, ServerEvent::SettingsUpdate(merged))
            }
            ClientEvent::AddStickyNote { note, .. } => {
                let note = action::add_sticky_note(store, &board_id, session, note)?;
                Delivery::BroadcastExcludeSender(board_id, ServerEvent::StickyNoteAdded(note))
            }
            ClientEvent::UpdateStickyNote { note, .. } => {
                let note = action::update_sticky_note(store, &board_id, note)?;
                Delivery::BroadcastExcludeSender(board_id, ServerEvent::StickyNoteUpdated(note))
            }
            ClientEvent::DeleteStickyNote { note_id, .. } => {
                action::delete_sticky_note(store, &board_id, &note_id)?;
                Delivery::BroadcastExcludeSender(board_id, ServerEvent::StickyNoteDeleted { id: note_id })
            }
            ClientEvent::AddComment { comment, .. } => {
                let comment = action::add_comment(store, &board_id, session, comment)?;
                Delivery::BroadcastExcludeSender(board_id, ServerEvent::CommentAdded(comment))
            }
            ClientEvent::DeleteComment { comment_id, .. } => {
                action::delete_comment(store, &board_id, &comment_id)?;
                Delivery::BroadcastExcludeSender(board_id, ServerEvent::CommentDeleted { id: comment_id })
            }
            ClientEvent::JoinBoard(_) | ClientEvent::CursorMove { .. } => return Ok(Vec::new()),
        };
        Ok(vec![delivery])
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable sender side of the hub. Every method is one round trip.
#[derive(Debug, Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<Command>,
}

/// Spawn the hub task with a bounded command queue.
#[must_use]
pub fn spawn_hub(capacity: usize) -> (HubHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(1));
    info!(capacity, "board hub started");
    let task = tokio::spawn(async move {
        let mut hub = Hub::new();
        while let Some(command) = rx.recv().await {
            if hub.handle(command).is_break() {
                break;
            }
        }
        info!("board hub stopped");
    });
    (HubHandle { tx }, task)
}

impl HubHandle {
    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| HubError::Unavailable)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, HubError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    /// # Errors
    ///
    /// `Unavailable` if the hub has stopped.
    pub async fn create_board(&self, title: Option<String>, password: Option<String>) -> Result<CreatedBoard, HubError> {
        self.request(|reply| Command::CreateBoard { title, password, reply }).await
    }

    /// # Errors
    ///
    /// `BoardNotFound`, or `Unavailable` if the hub has stopped.
    pub async fn board_summary(&self, board_id: BoardId) -> Result<BoardSummary, HubError> {
        Ok(self.request(|reply| Command::GetBoard { board_id, reply }).await??)
    }

    /// # Errors
    ///
    /// `BoardNotFound`, `InvalidPassword`, or `Unavailable`.
    pub async fn check_join(&self, board_id: BoardId, password: Option<String>) -> Result<(), HubError> {
        Ok(self.request(|reply| Command::CheckJoin { board_id, password, reply }).await??)
    }

    /// # Errors
    ///
    /// `Unavailable` if the hub has stopped.
    pub async fn connect(&self, session: SessionId, outbox: Outbox) -> Result<(), HubError> {
        self.send(Command::Connect { session, outbox }).await
    }

    /// # Errors
    ///
    /// `Unavailable` if the hub has stopped.
    pub async fn dispatch(&self, session: SessionId, event: ClientEvent) -> Result<(), HubError> {
        self.send(Command::Event { session, event }).await
    }

    /// # Errors
    ///
    /// `Unavailable` if the hub has stopped.
    pub async fn disconnect(&self, session: SessionId) -> Result<(), HubError> {
        self.send(Command::Disconnect { session }).await
    }

    /// Evict boards idle longer than `ttl` as of now.
    ///
    /// # Errors
    ///
    /// `Unavailable` if the hub has stopped.
    pub async fn reap(&self, ttl: Duration) -> Result<Vec<BoardId>, HubError> {
        self.request(|reply| Command::Reap { now: now_ms(), ttl, reply }).await
    }

    /// Ask the hub to drop its state and stop. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.send(Command::Shutdown).await;
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;

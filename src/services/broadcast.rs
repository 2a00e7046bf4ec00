//! Broadcast router: fans server events out to connections.
//!
//! DESIGN
//! ======
//! Handlers never send directly. They return `Delivery` values naming who
//! should receive what; the router resolves board membership from the store
//! at delivery time and pushes onto each connection's outbox in order.
//! Because one dispatcher delivers everything, every connection on a board
//! observes broadcasts in the same order.
//!
//! Sends are best-effort: a full or closed outbox drops that event for that
//! connection only.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::protocol::ServerEvent;
use crate::services::store::BoardStore;
use crate::state::{BoardId, SessionId};

/// Outbound event queue for one connection.
pub type Outbox = mpsc::Sender<ServerEvent>;

/// Addressing for one outbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// To the connection that sent the request.
    Reply(ServerEvent),
    /// To one specific connection.
    Notify(SessionId, ServerEvent),
    /// To every connection on the board, sender included.
    Broadcast(BoardId, ServerEvent),
    /// To every connection on the board except the sender.
    BroadcastExcludeSender(BoardId, ServerEvent),
}

#[derive(Debug, Default)]
pub struct BroadcastRouter {
    outboxes: HashMap<SessionId, Outbox>,
}

impl BroadcastRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, session: SessionId, outbox: Outbox) {
        self.outboxes.insert(session, outbox);
    }

    /// Stop delivering to a connection. Returns whether it was registered.
    pub fn unregister(&mut self, session: SessionId) -> bool {
        self.outboxes.remove(&session).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn clear(&mut self) {
        self.outboxes.clear();
    }

    /// Push one event to one connection. Returns whether it was queued.
    pub fn send(&self, session: SessionId, event: ServerEvent) -> bool {
        let Some(outbox) = self.outboxes.get(&session) else {
            return false;
        };
        match outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(%session, event = event.name(), "outbox full; dropping event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%session, "outbox closed");
                false
            }
        }
    }

    /// Send to every connection on a board, optionally excluding one.
    /// Returns how many connections the event was queued for.
    pub fn broadcast(&self, store: &BoardStore, board_id: &BoardId, event: &ServerEvent, exclude: Option<SessionId>) -> usize {
        let Ok(board) = store.get(board_id) else {
            return 0;
        };
        board
            .presence
            .sessions()
            .filter(|session| exclude != Some(*session))
            .filter(|session| self.send(*session, event.clone()))
            .count()
    }

    /// Apply a handler's deliveries in order on behalf of `origin`.
    pub fn deliver(&self, store: &BoardStore, origin: SessionId, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            match delivery {
                Delivery::Reply(event) => {
                    self.send(origin, event);
                }
                Delivery::Notify(session, event) => {
                    self.send(session, event);
                }
                Delivery::Broadcast(board_id, event) => {
                    self.broadcast(store, &board_id, &event, None);
                }
                Delivery::BroadcastExcludeSender(board_id, event) => {
                    self.broadcast(store, &board_id, &event, Some(origin));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "broadcast_test.rs"]
mod tests;

//! Session-core services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `store`, `presence`, `access`, `session` and `action` are synchronous state
//! transitions over the board store. `hub` owns that state on a single task
//! and applies the resulting deliveries through `broadcast`. `reaper` is the
//! only background activity and reaches the store through the hub.

pub mod access;
pub mod action;
pub mod broadcast;
pub mod hub;
pub mod presence;
pub mod reaper;
pub mod session;
pub mod store;

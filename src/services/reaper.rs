//! Reaper: background eviction of idle boards.
//!
//! DESIGN
//! ======
//! A periodic task asks the hub to drop every board whose last activity is
//! older than the idle TTL. The sweep is just another hub command, so it
//! only ever interleaves with request handling at command boundaries.
//!
//! Only structural edits (joins, leaves, drawing, notes, settings) count as
//! activity. Cursor motion does not keep a board alive.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::services::hub::HubHandle;

/// Spawn the reaper. The first sweep runs one `interval` after start.
/// The task ends when the hub stops.
pub fn spawn_reaper_task(hub: HubHandle, interval: Duration, ttl: Duration) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), ttl_secs = ttl.as_secs(), "board reaper configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match hub.reap(ttl).await {
                Ok(evicted) if evicted.is_empty() => debug!("reaper: nothing idle"),
                Ok(evicted) => info!(count = evicted.len(), "reaper: evicted idle boards"),
                Err(e) => {
                    warn!(error = %e, "reaper: hub unavailable; stopping");
                    break;
                }
            }
        }
    })
}

//! Background eviction of idle rooms.
//!
//! Only runs when `ROOM_IDLE_TTL_SECS` is set. A room is idle once its last
//! subscriber leaves (or it was created by a hydration request nobody joined);
//! after the TTL elapses the sweep drops it along with its shapes.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::info;

use crate::state::{AppState, RoomRegistry};

/// Spawn the eviction loop. Returns `None` when eviction is disabled.
#[must_use]
pub fn spawn_eviction_task(state: AppState) -> Option<JoinHandle<()>> {
    let ttl = state.config.room_idle_ttl?;
    let interval = state.config.room_sweep_interval;
    info!(ttl_secs = ttl.as_secs(), interval_secs = interval.as_secs(), "room eviction configured");
    Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            evict_idle_rooms(&state.rooms, ttl, Instant::now()).await;
        }
    }))
}

/// Drop every room idle for at least `ttl` as of `now`. Returns how many.
pub async fn evict_idle_rooms(rooms: &RoomRegistry, ttl: Duration, now: Instant) -> usize {
    let mut rooms = rooms.write().await;
    let evicted = rooms.evict_idle(ttl, now);
    for board_id in &evicted {
        info!(%board_id, remaining = rooms.len(), "evicted idle room");
    }
    evicted.len()
}

#[cfg(test)]
#[path = "sweeper_test.rs"]
mod tests;

//! Reclamation sweeper
//!
//! Periodic background task that asks the relay for consumer counts and
//! removes streams nobody is watching. Runs until aborted at shutdown.

use std::sync::Arc;
use std::time::Duration;

use super::manager::StreamManager;

/// Spawn the sweep task
///
/// Returns a handle used to abort the task at shutdown. The first cycle
/// runs one full period after spawning.
pub fn spawn(manager: Arc<StreamManager>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // interval fires immediately; skip so new streams get a full period
        ticker.tick().await;
        loop {
            ticker.tick().await;
            manager.sweep_idle().await;
        }
    })
}

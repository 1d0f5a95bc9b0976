use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::state::AppState;

/// Periodic safety net returning lapsed holds to Available. Per-tick
/// failures are logged and the schedule keeps running.
pub async fn start_hold_sweeper(state: AppState, every: Duration) {
    info!(interval_seconds = every.as_secs(), "hold expiry sweeper started");
    let mut ticker = interval(every);
    loop {
        ticker.tick().await;
        if let Err(e) = state.sweeper.tick(chrono::Utc::now()).await {
            error!("hold sweep failed: {}", e);
        }
    }
}

/// Periodic generation pass over every active route template. The engine
/// is incremental, so an extra run is cheap and a missed run is caught up
/// on the next one.
pub async fn start_generation_worker(state: AppState, every: Duration) {
    info!(
        interval_seconds = every.as_secs(),
        "trip generation worker started"
    );
    let mut ticker = interval(every);
    loop {
        ticker.tick().await;
        let today = state.local_today();
        match state.expansion.expand_all(today).await {
            Ok(summary) => {
                info!(
                    %today,
                    routes = summary.reports.len(),
                    created = summary.total_created,
                    "scheduled generation pass complete"
                );
            }
            Err(e) => error!("scheduled generation pass failed: {}", e),
        }
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use rutero_core::error::CoreError;
use rutero_core::repository::SeatRepository;

/// Safety net behind the lazy reclaim on hold paths: a periodic bulk pass
/// that returns every lapsed hold to Available. One tick is one bulk
/// conditional write, so a concurrent confirm on a still-live hold can
/// never be swept.
pub struct HoldExpirySweeper {
    seats: Arc<dyn SeatRepository>,
}

impl HoldExpirySweeper {
    pub fn new(seats: Arc<dyn SeatRepository>) -> Self {
        Self { seats }
    }

    /// Runs one sweep at `now`, returning how many holds were reclaimed.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<u64, CoreError> {
        let reclaimed = self.seats.release_expired(now).await?;
        if reclaimed > 0 {
            info!(reclaimed, "expired holds swept");
        } else {
            debug!("sweep pass found nothing to reclaim");
        }
        Ok(reclaimed)
    }
}

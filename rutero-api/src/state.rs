use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use rutero_core::repository::RouteTemplateRepository;
use rutero_reservation::{HoldExpirySweeper, ReservationEngine};
use rutero_schedule::ExpansionEngine;

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<dyn RouteTemplateRepository>,
    pub expansion: Arc<ExpansionEngine>,
    pub reservations: Arc<ReservationEngine>,
    pub sweeper: Arc<HoldExpirySweeper>,
    /// Civil zone all trip days are anchored to; fixed per deployment.
    pub operating_zone: Tz,
}

impl AppState {
    /// Today as a civil date in the operating zone, not in UTC. Around
    /// midnight the two disagree and the operating zone wins.
    pub fn local_today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.operating_zone).date_naive()
    }
}

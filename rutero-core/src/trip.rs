use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::route::RouteTemplate;

/// One stop of a trip with its absolute departure instant and the stored
/// per-stop price, denormalized from the route template at generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopDeparture {
    pub order: u32,
    pub stop: String,
    pub time: DateTime<Utc>,
    pub price: i64,
}

/// One concrete, dated departure produced from a route template.
///
/// At most one trip exists per (route template, departure instant); the
/// trip itself is never mutated by reservation activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripInstance {
    pub id: Uuid,
    pub route_template_id: Uuid,
    /// Civil day in the operating time zone this departure belongs to.
    pub service_date: NaiveDate,
    /// Departure instant of the origin stop; part of the idempotency key.
    pub departure: DateTime<Utc>,
    pub origin: String,
    pub destination: String,
    pub layout_id: Option<Uuid>,
    pub departures: Vec<StopDeparture>,
    pub created_at: DateTime<Utc>,
}

impl TripInstance {
    pub fn new(
        route: &RouteTemplate,
        service_date: NaiveDate,
        departure: DateTime<Utc>,
        departures: Vec<StopDeparture>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            route_template_id: route.id,
            service_date,
            departure,
            origin: route.origin().unwrap_or_default().to_string(),
            destination: route.destination().unwrap_or_default().to_string(),
            layout_id: route.layout_id,
            departures,
            created_at: Utc::now(),
        }
    }

    /// Stop identity is an opaque label frozen at generation time.
    pub fn departure_for(&self, stop: &str) -> Option<&StopDeparture> {
        self.departures.iter().find(|d| d.stop == stop)
    }
}

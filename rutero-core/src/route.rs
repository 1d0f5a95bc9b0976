use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Dated override on a recurrence rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionKind {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleException {
    pub date: NaiveDate,
    pub kind: ExceptionKind,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Weekday pattern and window deciding which civil days get a trip.
///
/// All dates are civil dates in the operating time zone; weekdays are
/// ISO numbered, 1 = Monday through 7 = Sunday.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub active: bool,
    pub weekdays: Vec<u8>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub horizon_days: u32,
    #[serde(default)]
    pub exceptions: Vec<ScheduleException>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self {
            active: true,
            weekdays: vec![1, 2, 3, 4, 5],
            start_date: None,
            end_date: None,
            horizon_days: 14,
            exceptions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub order: u32,
    pub name: String,
    pub offset_minutes: i64,
    pub price: i64,
    #[serde(default)]
    pub is_origin: bool,
    #[serde(default)]
    pub is_destination: bool,
}

/// Reusable recurrence + stop configuration from which dated trips are
/// generated. Mutated only by administrative CRUD, except for the
/// `last_generated` watermark which the expansion engine advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTemplate {
    pub id: Uuid,
    pub name: String,
    /// Base departure, minutes since local midnight. None = misconfigured.
    pub start_time: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub stops: Vec<RouteStop>,
    pub layout_id: Option<Uuid>,
    pub recurrence: RecurrenceRule,
    /// Watermark: last civil date through which trips have been generated.
    pub last_generated: Option<NaiveDate>,
}

impl RouteTemplate {
    pub fn new(
        name: impl Into<String>,
        start_time: Option<u32>,
        stops: Vec<RouteStop>,
        layout_id: Option<Uuid>,
        recurrence: RecurrenceRule,
    ) -> Self {
        let mut template = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            start_time,
            duration_minutes: None,
            stops,
            layout_id,
            recurrence,
            last_generated: None,
        };
        template.normalize_stops();
        template
    }

    /// The first and last stop carry the origin/destination flags.
    pub fn normalize_stops(&mut self) {
        let len = self.stops.len();
        for (i, stop) in self.stops.iter_mut().enumerate() {
            stop.is_origin = i == 0;
            stop.is_destination = i + 1 == len;
        }
    }

    /// Stop orders must be unique and strictly increasing, with at least an
    /// origin and a destination.
    pub fn validate_stops(&self) -> Result<(), CoreError> {
        if self.stops.len() < 2 {
            return Err(CoreError::Validation(format!(
                "route '{}' needs at least two stops",
                self.name
            )));
        }
        for pair in self.stops.windows(2) {
            if pair[1].order <= pair[0].order {
                return Err(CoreError::Validation(format!(
                    "route '{}' has non-increasing stop orders ({} then {})",
                    self.name, pair[0].order, pair[1].order
                )));
            }
        }
        Ok(())
    }

    pub fn origin(&self) -> Option<&str> {
        self.stops.first().map(|s| s.name.as_str())
    }

    pub fn destination(&self) -> Option<&str> {
        self.stops.last().map(|s| s.name.as_str())
    }
}

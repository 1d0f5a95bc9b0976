use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seat availability state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Held,
    Confirmed,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Held => "HELD",
            SeatStatus::Confirmed => "CONFIRMED",
        };
        f.write_str(s)
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SeatStatus::Available),
            "HELD" => Ok(SeatStatus::Held),
            "CONFIRMED" => Ok(SeatStatus::Confirmed),
            other => Err(format!("unknown seat status '{other}'")),
        }
    }
}

/// Who occupies a seat and for which stop segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassengerBinding {
    /// Opaque rider reference supplied by the identity source.
    pub rider: String,
    pub boarding_stop: String,
    pub alighting_stop: String,
    #[serde(default)]
    pub boarded: bool,
    #[serde(default)]
    pub landed: bool,
}

/// One physical seat within a trip instance.
///
/// Invariants: `hold_until` is present iff the seat is Held; `passenger`
/// is present iff the seat is Held or Confirmed. The `apply_*` mutators
/// keep those invariants; predicate checking belongs to the storage layer,
/// which must run each transition as a single atomic conditional write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub code: String,
    pub floor: i16,
    pub seat_type: Option<String>,
    pub status: SeatStatus,
    pub hold_until: Option<DateTime<Utc>>,
    pub passenger: Option<PassengerBinding>,
    /// Completed journeys on this seat, retained for fare reconciliation.
    #[serde(default)]
    pub occupancy_log: Vec<PassengerBinding>,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    pub fn new(trip_id: Uuid, code: impl Into<String>, floor: i16, seat_type: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            code: code.into(),
            floor,
            seat_type,
            status: SeatStatus::Available,
            hold_until: None,
            passenger: None,
            occupancy_log: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// A held seat whose expiry has passed is effectively available.
    pub fn hold_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Held
            && self.hold_until.map(|until| until <= now).unwrap_or(false)
    }

    pub fn apply_hold(
        &mut self,
        binding: PassengerBinding,
        hold_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.status = SeatStatus::Held;
        self.hold_until = Some(hold_until);
        self.passenger = Some(binding);
        self.updated_at = now;
    }

    /// Confirmed seats do not expire.
    pub fn apply_confirm(&mut self, now: DateTime<Utc>) {
        self.status = SeatStatus::Confirmed;
        self.hold_until = None;
        self.updated_at = now;
    }

    pub fn apply_release(&mut self, now: DateTime<Utc>) {
        self.status = SeatStatus::Available;
        self.hold_until = None;
        self.passenger = None;
        self.updated_at = now;
    }

    pub fn apply_boarded(&mut self, now: DateTime<Utc>) {
        if let Some(binding) = self.passenger.as_mut() {
            binding.boarded = true;
        }
        self.updated_at = now;
    }

    /// Frees the seat at the passenger's alighting point and archives the
    /// finished binding, so the seat is resellable for a later segment of
    /// the same trip without losing the journey record.
    pub fn apply_landed(&mut self, now: DateTime<Utc>) {
        if let Some(mut binding) = self.passenger.take() {
            binding.boarded = true;
            binding.landed = true;
            self.occupancy_log.push(binding);
        }
        self.status = SeatStatus::Available;
        self.hold_until = None;
        self.updated_at = now;
    }
}

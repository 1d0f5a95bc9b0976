use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use rutero_core::error::CoreError;
use rutero_core::repository::{SeatRepository, TripRepository};
use rutero_core::seat::{PassengerBinding, Seat};
use rutero_core::trip::TripInstance;

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    /// Opaque rider reference from the identity source.
    pub rider: String,
    pub boarding_stop: String,
    pub alighting_stop: String,
    /// Falls back to the configured default when absent.
    pub hold_minutes: Option<i64>,
}

/// Drives the per-seat state machine. Holds no locks of its own: every
/// transition delegates to one conditional write in the seat repository,
/// and failure diagnosis re-reads the seat afterwards.
pub struct ReservationEngine {
    trips: Arc<dyn TripRepository>,
    seats: Arc<dyn SeatRepository>,
    default_hold_minutes: i64,
}

impl ReservationEngine {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        seats: Arc<dyn SeatRepository>,
        default_hold_minutes: i64,
    ) -> Self {
        Self {
            trips,
            seats,
            default_hold_minutes,
        }
    }

    /// Places a temporary exclusive hold on a seat. Succeeds from
    /// Available, or from Held when the previous hold has lapsed.
    pub async fn reserve(
        &self,
        trip_id: Uuid,
        code: &str,
        req: ReserveRequest,
        now: DateTime<Utc>,
    ) -> Result<Seat, CoreError> {
        if req.rider.trim().is_empty() {
            return Err(CoreError::Validation("rider reference is required".to_string()));
        }
        let minutes = req.hold_minutes.unwrap_or(self.default_hold_minutes);
        if minutes <= 0 {
            return Err(CoreError::Validation(
                "hold duration must be a positive number of minutes".to_string(),
            ));
        }
        // The duration comes straight from the request body; reject values
        // the date arithmetic cannot represent instead of panicking.
        let hold_until = Duration::try_minutes(minutes)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| {
                CoreError::Validation(format!("hold duration of {minutes} minutes is out of range"))
            })?;

        let trip = self.require_trip(trip_id).await?;
        self.validate_segment(&trip, &req.boarding_stop, &req.alighting_stop)?;

        let binding = PassengerBinding {
            rider: req.rider,
            boarding_stop: req.boarding_stop,
            alighting_stop: req.alighting_stop,
            boarded: false,
            landed: false,
        };

        match self
            .seats
            .try_hold(trip_id, code, &binding, hold_until, now)
            .await?
        {
            Some(seat) => {
                info!(%trip_id, code, rider = %binding.rider, %hold_until, "seat held");
                Ok(seat)
            }
            None => Err(self.diagnose_failure(trip_id, code).await?),
        }
    }

    /// Confirms a live hold. A lapsed hold discovered here is self-healing:
    /// the seat is reverted to Available and Expired is reported.
    pub async fn confirm(
        &self,
        trip_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Seat, CoreError> {
        if let Some(seat) = self.seats.try_confirm(trip_id, code, now).await? {
            info!(%trip_id, code, "seat confirmed");
            return Ok(seat);
        }

        match self.seats.find(trip_id, code).await? {
            None => Err(self.missing_seat(trip_id, code).await?),
            Some(seat) if seat.hold_lapsed(now) => {
                self.seats.release_if_expired(trip_id, code, now).await?;
                debug!(%trip_id, code, "lapsed hold reclaimed during confirm");
                Err(CoreError::Expired(format!("hold on seat {code} has lapsed")))
            }
            Some(seat) => Err(CoreError::Conflict(format!(
                "seat {code} is {} and cannot be confirmed",
                seat.status
            ))),
        }
    }

    /// Returns a seat to Available. Idempotent: releasing an already
    /// Available seat succeeds without effect.
    pub async fn release(&self, trip_id: Uuid, code: &str) -> Result<Seat, CoreError> {
        match self.seats.release(trip_id, code).await? {
            Some(seat) => {
                info!(%trip_id, code, "seat released");
                Ok(seat)
            }
            None => Err(self.missing_seat(trip_id, code).await?),
        }
    }

    /// Read-only seat listing for a trip.
    pub async fn seats_for_trip(&self, trip_id: Uuid) -> Result<Vec<Seat>, CoreError> {
        self.require_trip(trip_id).await?;
        Ok(self.seats.list_for_trip(trip_id).await?)
    }

    /// Boarding annotation on a confirmed seat.
    pub async fn mark_boarded(&self, trip_id: Uuid, code: &str) -> Result<Seat, CoreError> {
        match self.seats.try_mark_boarded(trip_id, code).await? {
            Some(seat) => Ok(seat),
            None => Err(self.diagnose_annotation_failure(trip_id, code, "boarded").await?),
        }
    }

    /// Landing frees the seat at the passenger's alighting point so it can
    /// be resold for a later segment; the journey record is archived on the
    /// seat's occupancy log.
    pub async fn mark_landed(&self, trip_id: Uuid, code: &str) -> Result<Seat, CoreError> {
        match self.seats.try_mark_landed(trip_id, code).await? {
            Some(seat) => {
                info!(%trip_id, code, "passenger landed, seat resellable");
                Ok(seat)
            }
            None => Err(self.diagnose_annotation_failure(trip_id, code, "landed").await?),
        }
    }

    async fn require_trip(&self, trip_id: Uuid) -> Result<TripInstance, CoreError> {
        self.trips
            .get(trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("trip {trip_id}")))
    }

    /// Both stops must exist on the trip and the boarding stop must come
    /// before the alighting stop.
    fn validate_segment(
        &self,
        trip: &TripInstance,
        boarding: &str,
        alighting: &str,
    ) -> Result<(), CoreError> {
        let from = trip.departure_for(boarding).ok_or_else(|| {
            CoreError::Validation(format!("stop '{boarding}' is not on this trip"))
        })?;
        let to = trip.departure_for(alighting).ok_or_else(|| {
            CoreError::Validation(format!("stop '{alighting}' is not on this trip"))
        })?;
        if from.order >= to.order {
            return Err(CoreError::Validation(format!(
                "alighting stop '{alighting}' must come after boarding stop '{boarding}'"
            )));
        }
        Ok(())
    }

    async fn diagnose_failure(&self, trip_id: Uuid, code: &str) -> Result<CoreError, CoreError> {
        match self.seats.find(trip_id, code).await? {
            Some(seat) => Ok(CoreError::Conflict(format!(
                "seat {code} is {} and cannot be held",
                seat.status
            ))),
            None => self.missing_seat(trip_id, code).await,
        }
    }

    async fn diagnose_annotation_failure(
        &self,
        trip_id: Uuid,
        code: &str,
        what: &str,
    ) -> Result<CoreError, CoreError> {
        match self.seats.find(trip_id, code).await? {
            Some(seat) => Ok(CoreError::Conflict(format!(
                "seat {code} is {} and cannot be marked {what}",
                seat.status
            ))),
            None => self.missing_seat(trip_id, code).await,
        }
    }

    async fn missing_seat(&self, trip_id: Uuid, code: &str) -> Result<CoreError, CoreError> {
        if self.seats.count_for_trip(trip_id).await? == 0 {
            // Trip generated without a resolvable layout.
            Ok(CoreError::NotFound(format!("trip {trip_id} has no seat inventory")))
        } else {
            Ok(CoreError::NotFound(format!("seat {code} on trip {trip_id}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rutero_core::route::{RecurrenceRule, RouteStop, RouteTemplate};
    use rutero_core::seat::SeatStatus;
    use rutero_core::trip::StopDeparture;
    use rutero_store::MemoryStore;

    fn engine_with(store: &Arc<MemoryStore>) -> ReservationEngine {
        ReservationEngine::new(store.clone(), store.clone(), 10)
    }

    fn request(rider: &str) -> ReserveRequest {
        ReserveRequest {
            rider: rider.to_string(),
            boarding_stop: "Santiago".to_string(),
            alighting_stop: "Talca".to_string(),
            hold_minutes: None,
        }
    }

    async fn seed_trip(store: &Arc<MemoryStore>, seat_codes: &[&str]) -> TripInstance {
        let route = RouteTemplate::new(
            "Santiago - Talca",
            Some(480),
            vec![
                RouteStop {
                    order: 0,
                    name: "Santiago".to_string(),
                    offset_minutes: 0,
                    price: 0,
                    is_origin: false,
                    is_destination: false,
                },
                RouteStop {
                    order: 1,
                    name: "Rancagua".to_string(),
                    offset_minutes: 30,
                    price: 3500,
                    is_origin: false,
                    is_destination: false,
                },
                RouteStop {
                    order: 2,
                    name: "Talca".to_string(),
                    offset_minutes: 90,
                    price: 7000,
                    is_origin: false,
                    is_destination: false,
                },
            ],
            None,
            RecurrenceRule::default(),
        );
        let date = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let departure = Utc::now();
        let departures = route
            .stops
            .iter()
            .map(|s| StopDeparture {
                order: s.order,
                stop: s.name.clone(),
                time: departure + Duration::minutes(s.offset_minutes),
                price: s.price,
            })
            .collect();
        let trip = TripInstance::new(&route, date, departure, departures);
        store.insert(&trip).await.unwrap();

        let seats: Vec<Seat> = seat_codes
            .iter()
            .map(|code| Seat::new(trip.id, *code, 1, None))
            .collect();
        store.insert_many(&seats).await.unwrap();
        trip
    }

    #[tokio::test]
    async fn reserve_then_confirm_happy_path() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;
        let now = Utc::now();

        let held = engine
            .reserve(trip.id, "1A", request("11.111.111-1"), now)
            .await
            .unwrap();
        assert_eq!(held.status, SeatStatus::Held);
        assert_eq!(held.hold_until, Some(now + Duration::minutes(10)));

        let confirmed = engine.confirm(trip.id, "1A", now).await.unwrap();
        assert_eq!(confirmed.status, SeatStatus::Confirmed);
        assert!(confirmed.hold_until.is_none());
        assert!(confirmed.passenger.is_some());
    }

    #[tokio::test]
    async fn concurrent_reserves_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;
        let now = Utc::now();

        let (a, b) = tokio::join!(
            engine.reserve(trip.id, "1A", request("rider-a"), now),
            engine.reserve(trip.id, "1A", request("rider-b"), now),
        );

        let outcomes = [a, b];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        let loser = outcomes
            .iter()
            .find_map(|r| r.as_ref().err())
            .expect("one caller must lose");
        assert!(matches!(loser, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn reserve_over_a_lapsed_hold_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;
        let now = Utc::now();

        engine
            .reserve(
                trip.id,
                "1A",
                ReserveRequest {
                    hold_minutes: Some(5),
                    ..request("first")
                },
                now,
            )
            .await
            .unwrap();

        let later = now + Duration::minutes(6);
        let retaken = engine
            .reserve(trip.id, "1A", request("second"), later)
            .await
            .unwrap();
        assert_eq!(
            retaken.passenger.as_ref().map(|b| b.rider.as_str()),
            Some("second")
        );
    }

    #[tokio::test]
    async fn confirm_after_expiry_reports_expired_and_frees_the_seat() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;
        let now = Utc::now();

        engine
            .reserve(trip.id, "1A", request("rider"), now)
            .await
            .unwrap();

        let later = now + Duration::minutes(11);
        let err = engine.confirm(trip.id, "1A", later).await.unwrap_err();
        assert!(matches!(err, CoreError::Expired(_)));

        let seat = store.find(trip.id, "1A").await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
        assert!(seat.passenger.is_none());
        assert!(seat.hold_until.is_none());
    }

    #[tokio::test]
    async fn confirm_on_an_available_seat_is_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;

        let err = engine.confirm(trip.id, "1A", Utc::now()).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;
        let now = Utc::now();

        engine
            .reserve(trip.id, "1A", request("rider"), now)
            .await
            .unwrap();
        let released = engine.release(trip.id, "1A").await.unwrap();
        assert_eq!(released.status, SeatStatus::Available);

        // second release is a no-op success
        let again = engine.release(trip.id, "1A").await.unwrap();
        assert_eq!(again.status, SeatStatus::Available);
    }

    #[tokio::test]
    async fn out_of_range_hold_minutes_is_a_validation_error() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;
        let now = Utc::now();

        for minutes in [i64::MAX, i64::MAX / 60 + 1] {
            let oversized = ReserveRequest {
                hold_minutes: Some(minutes),
                ..request("rider")
            };
            let err = engine
                .reserve(trip.id, "1A", oversized, now)
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "minutes = {minutes}");
        }

        // seat untouched after the rejections
        let seat = store.find(trip.id, "1A").await.unwrap().unwrap();
        assert_eq!(seat.status, SeatStatus::Available);
    }

    #[tokio::test]
    async fn segment_validation_rejects_backwards_and_unknown_stops() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;
        let now = Utc::now();

        let backwards = ReserveRequest {
            boarding_stop: "Talca".to_string(),
            alighting_stop: "Santiago".to_string(),
            ..request("rider")
        };
        let err = engine
            .reserve(trip.id, "1A", backwards, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let unknown = ReserveRequest {
            alighting_stop: "Temuco".to_string(),
            ..request("rider")
        };
        let err = engine
            .reserve(trip.id, "1A", unknown, now)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn landing_frees_the_seat_for_a_later_segment() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;
        let now = Utc::now();

        // Santiago -> Rancagua passenger
        let first_leg = ReserveRequest {
            alighting_stop: "Rancagua".to_string(),
            ..request("first")
        };
        engine.reserve(trip.id, "1A", first_leg, now).await.unwrap();
        engine.confirm(trip.id, "1A", now).await.unwrap();
        engine.mark_boarded(trip.id, "1A").await.unwrap();
        let landed = engine.mark_landed(trip.id, "1A").await.unwrap();
        assert_eq!(landed.status, SeatStatus::Available);
        assert_eq!(landed.occupancy_log.len(), 1);
        assert_eq!(landed.occupancy_log[0].alighting_stop, "Rancagua");

        // same physical seat, Rancagua -> Talca
        let second_leg = ReserveRequest {
            boarding_stop: "Rancagua".to_string(),
            ..request("second")
        };
        let held = engine
            .reserve(trip.id, "1A", second_leg, now)
            .await
            .unwrap();
        assert_eq!(held.status, SeatStatus::Held);
        assert_eq!(held.occupancy_log.len(), 1);
    }

    #[tokio::test]
    async fn boarding_requires_a_confirmed_seat() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &["1A"]).await;

        let err = engine.mark_boarded(trip.id, "1A").await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn zero_seat_trip_reports_no_inventory() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);
        let trip = seed_trip(&store, &[]).await;

        let err = engine
            .reserve(trip.id, "1A", request("rider"), Utc::now())
            .await
            .unwrap_err();
        match err {
            CoreError::NotFound(msg) => assert!(msg.contains("no seat inventory")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_trip_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_with(&store);

        let err = engine
            .reserve(Uuid::new_v4(), "1A", request("rider"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}

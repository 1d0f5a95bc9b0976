use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};
use uuid::Uuid;

use rutero_core::error::CoreError;
use rutero_core::layout::SeatLayout;
use rutero_core::repository::{SeatLayoutRepository, SeatRepository, TripRepository};
use rutero_core::route::RouteTemplate;
use rutero_core::seat::Seat;
use rutero_core::trip::{StopDeparture, TripInstance};

/// Result of one factory call: the trip for (template, date) and whether
/// this call actually created it.
#[derive(Debug)]
pub struct TripOutcome {
    pub trip: TripInstance,
    pub created: bool,
}

/// Materializes one dated trip instance from a route template, including
/// its seat inventory. Idempotent on (template, departure instant).
pub struct TripFactory {
    trips: Arc<dyn TripRepository>,
    seats: Arc<dyn SeatRepository>,
    layouts: Arc<dyn SeatLayoutRepository>,
    tz: Tz,
}

impl TripFactory {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        seats: Arc<dyn SeatRepository>,
        layouts: Arc<dyn SeatLayoutRepository>,
        tz: Tz,
    ) -> Self {
        Self {
            trips,
            seats,
            layouts,
            tz,
        }
    }

    pub fn operating_zone(&self) -> Tz {
        self.tz
    }

    pub async fn create_trip_instance(
        &self,
        route: &RouteTemplate,
        date: NaiveDate,
    ) -> Result<TripOutcome, CoreError> {
        let start_time = route.start_time.ok_or_else(|| {
            CoreError::Configuration(format!(
                "route '{}' has no start_time (minutes since midnight)",
                route.name
            ))
        })?;
        route.validate_stops()?;

        let departure = local_instant(self.tz, date, i64::from(start_time)).ok_or_else(|| {
            CoreError::Configuration(format!(
                "route '{}': {date} {:02}:{:02} does not exist in {}",
                route.name,
                start_time / 60,
                start_time % 60,
                self.tz
            ))
        })?;

        if let Some(existing) = self.trips.find_by_departure(route.id, departure).await? {
            debug!(route = %route.name, %date, "trip already exists, returning as-is");
            return Ok(TripOutcome {
                trip: existing,
                created: false,
            });
        }

        let departures = route
            .stops
            .iter()
            .map(|stop| StopDeparture {
                order: stop.order,
                stop: stop.name.clone(),
                time: departure + Duration::minutes(stop.offset_minutes),
                price: stop.price,
            })
            .collect();

        let trip = TripInstance::new(route, date, departure, departures);

        if !self.trips.insert(&trip).await? {
            // Lost the race with a concurrent generation pass. The winner's
            // trip must be readable back; anything else is a store fault and
            // must not fall through to seat materialization.
            return match self.trips.find_by_departure(route.id, departure).await? {
                Some(existing) => Ok(TripOutcome {
                    trip: existing,
                    created: false,
                }),
                None => Err(CoreError::Storage(format!(
                    "route '{}': trip at {departure} rejected as duplicate but absent on re-read",
                    route.name
                ))),
            };
        }

        let layout = match route.layout_id {
            Some(layout_id) => self.layouts.get(layout_id).await?,
            None => None,
        };
        match layout {
            Some(layout) => {
                let seats = materialize_seats(trip.id, &layout);
                self.seats.insert_many(&seats).await?;
                debug!(route = %route.name, %date, seats = seats.len(), "trip created");
            }
            None => {
                // A trip may exist before seats are provisioned; reservation
                // calls against it report "no seat inventory".
                warn!(route = %route.name, %date, "layout unavailable, trip created with zero seats");
            }
        }

        Ok(TripOutcome {
            trip,
            created: true,
        })
    }
}

/// One seat row per non-blank cell of every deck's grid, initialized
/// Available with the deck's floor and seat type.
fn materialize_seats(trip_id: Uuid, layout: &SeatLayout) -> Vec<Seat> {
    layout
        .decks
        .iter()
        .flat_map(|deck| {
            deck.seat_codes()
                .map(move |code| Seat::new(trip_id, code, deck.floor, deck.seat_type.clone()))
        })
        .collect()
}

/// Wall-clock `date` + `minutes` in `tz`, as a UTC instant. Ambiguous local
/// times (DST fold) resolve to the earliest instant; nonexistent ones (DST
/// gap) resolve to None.
fn local_instant(tz: Tz, date: NaiveDate, minutes: i64) -> Option<DateTime<Utc>> {
    let naive = date.and_time(NaiveTime::MIN) + Duration::minutes(minutes);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use rutero_core::layout::DeckPlan;
    use rutero_core::route::{RecurrenceRule, RouteStop};
    use rutero_store::MemoryStore;

    fn stop(order: u32, name: &str, offset: i64, price: i64) -> RouteStop {
        RouteStop {
            order,
            name: name.to_string(),
            offset_minutes: offset,
            price,
            is_origin: false,
            is_destination: false,
        }
    }

    fn layout() -> SeatLayout {
        SeatLayout {
            id: Uuid::new_v4(),
            name: "double decker".to_string(),
            decks: vec![
                DeckPlan {
                    floor: 1,
                    seat_type: Some("cama".to_string()),
                    seat_map: vec![
                        vec!["1A".to_string(), "".to_string(), "1B".to_string()],
                        vec!["2A".to_string(), "".to_string(), "2B".to_string()],
                    ],
                },
                DeckPlan {
                    floor: 2,
                    seat_type: Some("semi-cama".to_string()),
                    seat_map: vec![vec!["3A".to_string(), "3B".to_string()]],
                },
            ],
        }
    }

    fn factory_with(store: &Arc<MemoryStore>) -> TripFactory {
        TripFactory::new(
            store.clone(),
            store.clone(),
            store.clone(),
            chrono_tz::America::Santiago,
        )
    }

    #[tokio::test]
    async fn stop_departures_carry_offsets_and_prices() {
        let store = Arc::new(MemoryStore::new());
        let factory = factory_with(&store);

        // base 08:00 local; stops at +0, +30, +90
        let route = RouteTemplate::new(
            "Santiago - Talca",
            Some(8 * 60),
            vec![
                stop(0, "Santiago", 0, 0),
                stop(1, "Rancagua", 30, 3500),
                stop(2, "Talca", 90, 7000),
            ],
            None,
            RecurrenceRule::default(),
        );

        let date = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let outcome = factory.create_trip_instance(&route, date).await.unwrap();
        assert!(outcome.created);

        let trip = outcome.trip;
        let tz = chrono_tz::America::Santiago;
        let local: Vec<(u32, u32)> = trip
            .departures
            .iter()
            .map(|d| {
                let t = d.time.with_timezone(&tz);
                (t.hour(), t.minute())
            })
            .collect();
        assert_eq!(local, vec![(8, 0), (8, 30), (9, 30)]);
        assert_eq!(
            trip.departures.iter().map(|d| d.price).collect::<Vec<_>>(),
            vec![0, 3500, 7000]
        );
        assert_eq!(trip.origin, "Santiago");
        assert_eq!(trip.destination, "Talca");
        assert_eq!(trip.service_date, date);
    }

    #[tokio::test]
    async fn repeated_calls_return_the_existing_trip() {
        let store = Arc::new(MemoryStore::new());
        let factory = factory_with(&store);
        let route = RouteTemplate::new(
            "r",
            Some(600),
            vec![stop(0, "A", 0, 0), stop(1, "B", 60, 100)],
            None,
            RecurrenceRule::default(),
        );
        let date = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();

        let first = factory.create_trip_instance(&route, date).await.unwrap();
        let second = factory.create_trip_instance(&route, date).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.trip.id, second.trip.id);
    }

    #[tokio::test]
    async fn missing_start_time_is_a_configuration_error() {
        let store = Arc::new(MemoryStore::new());
        let factory = factory_with(&store);
        let route = RouteTemplate::new(
            "broken",
            None,
            vec![stop(0, "A", 0, 0), stop(1, "B", 60, 100)],
            None,
            RecurrenceRule::default(),
        );
        let date = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let err = factory.create_trip_instance(&route, date).await.unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[tokio::test]
    async fn seats_are_materialized_from_every_deck() {
        let store = Arc::new(MemoryStore::new());
        let factory = factory_with(&store);

        let deck_layout = layout();
        rutero_core::repository::SeatLayoutRepository::insert(store.as_ref(), &deck_layout)
            .await
            .unwrap();

        let route = RouteTemplate::new(
            "r",
            Some(480),
            vec![stop(0, "A", 0, 0), stop(1, "B", 60, 100)],
            Some(deck_layout.id),
            RecurrenceRule::default(),
        );
        let date = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        let outcome = factory.create_trip_instance(&route, date).await.unwrap();

        let seats = rutero_core::repository::SeatRepository::list_for_trip(
            store.as_ref(),
            outcome.trip.id,
        )
        .await
        .unwrap();
        assert_eq!(seats.len(), 6);
        assert!(seats.iter().all(|s| s.status == rutero_core::SeatStatus::Available));
        let upper: Vec<&str> = seats
            .iter()
            .filter(|s| s.floor == 2)
            .map(|s| s.code.as_str())
            .collect();
        assert_eq!(upper, vec!["3A", "3B"]);
        assert_eq!(
            seats.iter().find(|s| s.code == "1A").and_then(|s| s.seat_type.as_deref()),
            Some("cama")
        );
    }

    /// Claims every insert is a duplicate yet never returns the winner,
    /// remembering the trip id it turned away.
    #[derive(Default)]
    struct VanishingTripStore {
        rejected: std::sync::Mutex<Option<Uuid>>,
    }

    #[async_trait::async_trait]
    impl rutero_core::repository::TripRepository for VanishingTripStore {
        async fn get(
            &self,
            _id: Uuid,
        ) -> rutero_core::repository::StoreResult<Option<TripInstance>> {
            Ok(None)
        }

        async fn find_by_departure(
            &self,
            _route_template_id: Uuid,
            _departure: DateTime<Utc>,
        ) -> rutero_core::repository::StoreResult<Option<TripInstance>> {
            Ok(None)
        }

        async fn insert(
            &self,
            trip: &TripInstance,
        ) -> rutero_core::repository::StoreResult<bool> {
            *self.rejected.lock().unwrap() = Some(trip.id);
            Ok(false)
        }

        async fn list_for_route(
            &self,
            _route_template_id: Uuid,
        ) -> rutero_core::repository::StoreResult<Vec<TripInstance>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn duplicate_insert_with_no_winner_is_a_storage_error() {
        let store = Arc::new(MemoryStore::new());
        let trips = Arc::new(VanishingTripStore::default());
        let factory = TripFactory::new(
            trips.clone(),
            store.clone(),
            store.clone(),
            chrono_tz::America::Santiago,
        );

        let deck_layout = layout();
        rutero_core::repository::SeatLayoutRepository::insert(store.as_ref(), &deck_layout)
            .await
            .unwrap();
        let route = RouteTemplate::new(
            "r",
            Some(480),
            vec![stop(0, "A", 0, 0), stop(1, "B", 60, 100)],
            Some(deck_layout.id),
            RecurrenceRule::default(),
        );
        let date = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();

        let err = factory.create_trip_instance(&route, date).await.unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));

        // no seats were materialized for the phantom trip
        let phantom = trips.rejected.lock().unwrap().expect("insert was attempted");
        let count = rutero_core::repository::SeatRepository::count_for_trip(
            store.as_ref(),
            phantom,
        )
        .await
        .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn unresolvable_layout_yields_a_trip_with_zero_seats() {
        let store = Arc::new(MemoryStore::new());
        let factory = factory_with(&store);
        let route = RouteTemplate::new(
            "r",
            Some(480),
            vec![stop(0, "A", 0, 0), stop(1, "B", 60, 100)],
            Some(Uuid::new_v4()), // dangling reference
            RecurrenceRule::default(),
        );
        let date = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        let outcome = factory.create_trip_instance(&route, date).await.unwrap();
        assert!(outcome.created);

        let count = rutero_core::repository::SeatRepository::count_for_trip(
            store.as_ref(),
            outcome.trip.id,
        )
        .await
        .unwrap();
        assert_eq!(count, 0);
    }
}

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use rutero_core::layout::SeatLayout;
use rutero_core::repository::{
    RouteTemplateRepository, SeatLayoutRepository, SeatRepository, StoreError, StoreResult,
    TripRepository,
};
use rutero_core::route::RouteTemplate;
use rutero_core::seat::{PassengerBinding, Seat, SeatStatus};
use rutero_core::trip::TripInstance;

/// In-memory document store used by tests and dev mode.
///
/// Each operation runs inside one critical section per collection, which
/// gives the same per-document atomicity the Postgres store gets from
/// single-statement conditional updates.
#[derive(Default)]
pub struct MemoryStore {
    routes: Mutex<HashMap<Uuid, RouteTemplate>>,
    layouts: Mutex<HashMap<Uuid, SeatLayout>>,
    trips: Mutex<HashMap<Uuid, TripInstance>>,
    seats: Mutex<HashMap<(Uuid, String), Seat>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn guard<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
}

#[async_trait]
impl RouteTemplateRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<RouteTemplate>> {
        Ok(guard(&self.routes)?.get(&id).cloned())
    }

    async fn list_active(&self) -> StoreResult<Vec<RouteTemplate>> {
        let routes = guard(&self.routes)?;
        let mut active: Vec<RouteTemplate> = routes
            .values()
            .filter(|r| r.recurrence.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }

    async fn insert(&self, template: &RouteTemplate) -> StoreResult<()> {
        guard(&self.routes)?.insert(template.id, template.clone());
        Ok(())
    }

    async fn advance_watermark(&self, id: Uuid, through: NaiveDate) -> StoreResult<()> {
        let mut routes = guard(&self.routes)?;
        let route = routes
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("route template {id}")))?;
        if route.last_generated.map(|d| d < through).unwrap_or(true) {
            route.last_generated = Some(through);
        }
        Ok(())
    }
}

#[async_trait]
impl SeatLayoutRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<SeatLayout>> {
        Ok(guard(&self.layouts)?.get(&id).cloned())
    }

    async fn insert(&self, layout: &SeatLayout) -> StoreResult<()> {
        guard(&self.layouts)?.insert(layout.id, layout.clone());
        Ok(())
    }
}

#[async_trait]
impl TripRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<TripInstance>> {
        Ok(guard(&self.trips)?.get(&id).cloned())
    }

    async fn find_by_departure(
        &self,
        route_template_id: Uuid,
        departure: DateTime<Utc>,
    ) -> StoreResult<Option<TripInstance>> {
        let trips = guard(&self.trips)?;
        Ok(trips
            .values()
            .find(|t| t.route_template_id == route_template_id && t.departure == departure)
            .cloned())
    }

    async fn insert(&self, trip: &TripInstance) -> StoreResult<bool> {
        let mut trips = guard(&self.trips)?;
        let exists = trips
            .values()
            .any(|t| t.route_template_id == trip.route_template_id && t.departure == trip.departure);
        if exists {
            return Ok(false);
        }
        trips.insert(trip.id, trip.clone());
        Ok(true)
    }

    async fn list_for_route(&self, route_template_id: Uuid) -> StoreResult<Vec<TripInstance>> {
        let trips = guard(&self.trips)?;
        let mut found: Vec<TripInstance> = trips
            .values()
            .filter(|t| t.route_template_id == route_template_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.departure);
        Ok(found)
    }
}

#[async_trait]
impl SeatRepository for MemoryStore {
    async fn find(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>> {
        Ok(guard(&self.seats)?
            .get(&(trip_id, code.to_string()))
            .cloned())
    }

    async fn list_for_trip(&self, trip_id: Uuid) -> StoreResult<Vec<Seat>> {
        let seats = guard(&self.seats)?;
        let mut found: Vec<Seat> = seats
            .values()
            .filter(|s| s.trip_id == trip_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.floor, &a.code).cmp(&(b.floor, &b.code)));
        Ok(found)
    }

    async fn count_for_trip(&self, trip_id: Uuid) -> StoreResult<u64> {
        let seats = guard(&self.seats)?;
        Ok(seats.values().filter(|s| s.trip_id == trip_id).count() as u64)
    }

    async fn insert_many(&self, new_seats: &[Seat]) -> StoreResult<()> {
        let mut seats = guard(&self.seats)?;
        for seat in new_seats {
            seats.insert((seat.trip_id, seat.code.clone()), seat.clone());
        }
        Ok(())
    }

    async fn try_hold(
        &self,
        trip_id: Uuid,
        code: &str,
        binding: &PassengerBinding,
        hold_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Seat>> {
        let mut seats = guard(&self.seats)?;
        let Some(seat) = seats.get_mut(&(trip_id, code.to_string())) else {
            return Ok(None);
        };
        if seat.status == SeatStatus::Available || seat.hold_lapsed(now) {
            seat.apply_hold(binding.clone(), hold_until, now);
            return Ok(Some(seat.clone()));
        }
        Ok(None)
    }

    async fn try_confirm(
        &self,
        trip_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Seat>> {
        let mut seats = guard(&self.seats)?;
        let Some(seat) = seats.get_mut(&(trip_id, code.to_string())) else {
            return Ok(None);
        };
        if seat.status == SeatStatus::Held && !seat.hold_lapsed(now) {
            seat.apply_confirm(now);
            return Ok(Some(seat.clone()));
        }
        Ok(None)
    }

    async fn release(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>> {
        let mut seats = guard(&self.seats)?;
        let Some(seat) = seats.get_mut(&(trip_id, code.to_string())) else {
            return Ok(None);
        };
        seat.apply_release(Utc::now());
        Ok(Some(seat.clone()))
    }

    async fn release_if_expired(
        &self,
        trip_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut seats = guard(&self.seats)?;
        let Some(seat) = seats.get_mut(&(trip_id, code.to_string())) else {
            return Ok(false);
        };
        if seat.hold_lapsed(now) {
            seat.apply_release(now);
            return Ok(true);
        }
        Ok(false)
    }

    async fn try_mark_boarded(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>> {
        let mut seats = guard(&self.seats)?;
        let Some(seat) = seats.get_mut(&(trip_id, code.to_string())) else {
            return Ok(None);
        };
        if seat.status == SeatStatus::Confirmed && seat.passenger.is_some() {
            seat.apply_boarded(Utc::now());
            return Ok(Some(seat.clone()));
        }
        Ok(None)
    }

    async fn try_mark_landed(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>> {
        let mut seats = guard(&self.seats)?;
        let Some(seat) = seats.get_mut(&(trip_id, code.to_string())) else {
            return Ok(None);
        };
        if seat.status == SeatStatus::Confirmed && seat.passenger.is_some() {
            seat.apply_landed(Utc::now());
            return Ok(Some(seat.clone()));
        }
        Ok(None)
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut seats = guard(&self.seats)?;
        let mut released = 0;
        for seat in seats.values_mut() {
            if seat.hold_lapsed(now) {
                seat.apply_release(now);
                released += 1;
            }
        }
        Ok(released)
    }
}

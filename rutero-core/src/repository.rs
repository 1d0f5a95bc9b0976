use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::layout::SeatLayout;
use crate::route::RouteTemplate;
use crate::seat::{PassengerBinding, Seat};
use crate::trip::TripInstance;

/// Storage-level failures. `NotFound` is reserved for lookups that name a
/// specific document; predicate misses on conditional writes are reported
/// as `Ok(None)` instead, so callers can translate them into business
/// conflicts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RouteTemplateRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<RouteTemplate>>;

    /// Templates whose recurrence rule is active.
    async fn list_active(&self) -> StoreResult<Vec<RouteTemplate>>;

    async fn insert(&self, template: &RouteTemplate) -> StoreResult<()>;

    /// Advances the generation watermark. Monotonic: a watermark already at
    /// or past `through` is left alone.
    async fn advance_watermark(&self, id: Uuid, through: NaiveDate) -> StoreResult<()>;
}

#[async_trait]
pub trait SeatLayoutRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<SeatLayout>>;

    async fn insert(&self, layout: &SeatLayout) -> StoreResult<()>;
}

#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<TripInstance>>;

    async fn find_by_departure(
        &self,
        route_template_id: Uuid,
        departure: DateTime<Utc>,
    ) -> StoreResult<Option<TripInstance>>;

    /// Create-if-absent on the (route template, departure instant)
    /// idempotency key. Returns false when a trip already existed.
    async fn insert(&self, trip: &TripInstance) -> StoreResult<bool>;

    async fn list_for_route(&self, route_template_id: Uuid) -> StoreResult<Vec<TripInstance>>;
}

/// Seat persistence. Every state transition is a single atomic conditional
/// write: the method succeeds with the updated seat only if the documented
/// precondition held at write time. The store's per-document atomicity is
/// the sole serialization point; no caller-side locking is expected.
#[async_trait]
pub trait SeatRepository: Send + Sync {
    async fn find(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>>;

    async fn list_for_trip(&self, trip_id: Uuid) -> StoreResult<Vec<Seat>>;

    async fn count_for_trip(&self, trip_id: Uuid) -> StoreResult<u64>;

    async fn insert_many(&self, seats: &[Seat]) -> StoreResult<()>;

    /// Precondition: Available, or Held with `hold_until <= now`.
    async fn try_hold(
        &self,
        trip_id: Uuid,
        code: &str,
        binding: &PassengerBinding,
        hold_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Seat>>;

    /// Precondition: Held with `hold_until > now`.
    async fn try_confirm(
        &self,
        trip_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Seat>>;

    /// Unconditional return to Available, clearing binding and expiry.
    /// `Ok(None)` only when the seat row does not exist.
    async fn release(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>>;

    /// Precondition: Held with `hold_until <= now`. Used for the self-heal
    /// on confirm-after-expiry; returns whether the seat was reclaimed.
    async fn release_if_expired(
        &self,
        trip_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Precondition: Confirmed with a live binding.
    async fn try_mark_boarded(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>>;

    /// Precondition: Confirmed with a live binding. Archives the binding
    /// into the occupancy log and frees the seat.
    async fn try_mark_landed(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>>;

    /// Bulk sweep: every Held seat with `hold_until <= now` goes back to
    /// Available with binding and expiry cleared. Returns the count.
    async fn release_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

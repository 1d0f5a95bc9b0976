use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use rutero_core::repository::{StoreResult, TripRepository};
use rutero_core::trip::TripInstance;

use crate::{db_err, json_err};

pub struct PgTripRepository {
    pub pool: PgPool,
}

const TRIP_COLUMNS: &str = "id, route_template_id, service_date, departure, origin, destination, \
                            layout_id, departures, created_at";

fn trip_from_row(row: &PgRow) -> StoreResult<TripInstance> {
    Ok(TripInstance {
        id: row.try_get("id").map_err(db_err)?,
        route_template_id: row.try_get("route_template_id").map_err(db_err)?,
        service_date: row.try_get("service_date").map_err(db_err)?,
        departure: row.try_get("departure").map_err(db_err)?,
        origin: row.try_get("origin").map_err(db_err)?,
        destination: row.try_get("destination").map_err(db_err)?,
        layout_id: row.try_get("layout_id").map_err(db_err)?,
        departures: serde_json::from_value(row.try_get("departures").map_err(db_err)?)
            .map_err(json_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

#[async_trait]
impl TripRepository for PgTripRepository {
    async fn get(&self, id: Uuid) -> StoreResult<Option<TripInstance>> {
        let row = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trip_instances WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(trip_from_row).transpose()
    }

    async fn find_by_departure(
        &self,
        route_template_id: Uuid,
        departure: DateTime<Utc>,
    ) -> StoreResult<Option<TripInstance>> {
        let row = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trip_instances \
             WHERE route_template_id = $1 AND departure = $2"
        ))
        .bind(route_template_id)
        .bind(departure)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(trip_from_row).transpose()
    }

    async fn insert(&self, trip: &TripInstance) -> StoreResult<bool> {
        // The unique index on (route_template_id, departure) is the
        // idempotency key; losing the race is not an error.
        let result = sqlx::query(
            "INSERT INTO trip_instances \
             (id, route_template_id, service_date, departure, origin, destination, \
              layout_id, departures, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (route_template_id, departure) DO NOTHING",
        )
        .bind(trip.id)
        .bind(trip.route_template_id)
        .bind(trip.service_date)
        .bind(trip.departure)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.layout_id)
        .bind(serde_json::to_value(&trip.departures).map_err(json_err)?)
        .bind(trip.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_route(&self, route_template_id: Uuid) -> StoreResult<Vec<TripInstance>> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trip_instances \
             WHERE route_template_id = $1 ORDER BY departure"
        ))
        .bind(route_template_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(trip_from_row).collect()
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use rutero_core::repository::{SeatRepository, StoreError, StoreResult};
use rutero_core::seat::{PassengerBinding, Seat, SeatStatus};

use crate::{db_err, json_err};

/// Postgres seat store. Every transition is a single conditional
/// `UPDATE ... WHERE <precondition> RETURNING`, so the row lock taken by
/// the statement is the only serialization point and two racing callers
/// can never both observe their precondition as true.
pub struct PgSeatRepository {
    pub pool: PgPool,
}

const SEAT_COLUMNS: &str = "id, trip_id, code, floor, seat_type, status, hold_until, passenger, \
                            occupancy_log, updated_at";

fn seat_from_row(row: &PgRow) -> StoreResult<Seat> {
    let status: String = row.try_get("status").map_err(db_err)?;
    let status: SeatStatus = status.parse().map_err(StoreError::Backend)?;
    let passenger: Option<PassengerBinding> = row
        .try_get::<Option<serde_json::Value>, _>("passenger")
        .map_err(db_err)?
        .map(serde_json::from_value)
        .transpose()
        .map_err(json_err)?;

    Ok(Seat {
        id: row.try_get("id").map_err(db_err)?,
        trip_id: row.try_get("trip_id").map_err(db_err)?,
        code: row.try_get("code").map_err(db_err)?,
        floor: row.try_get("floor").map_err(db_err)?,
        seat_type: row.try_get("seat_type").map_err(db_err)?,
        status,
        hold_until: row.try_get("hold_until").map_err(db_err)?,
        passenger,
        occupancy_log: serde_json::from_value(row.try_get("occupancy_log").map_err(db_err)?)
            .map_err(json_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

#[async_trait]
impl SeatRepository for PgSeatRepository {
    async fn find(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>> {
        let row = sqlx::query(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE trip_id = $1 AND code = $2"
        ))
        .bind(trip_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(seat_from_row).transpose()
    }

    async fn list_for_trip(&self, trip_id: Uuid) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE trip_id = $1 ORDER BY floor, code"
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(seat_from_row).collect()
    }

    async fn count_for_trip(&self, trip_id: Uuid) -> StoreResult<u64> {
        let row = sqlx::query("SELECT count(*) AS n FROM seats WHERE trip_id = $1")
            .bind(trip_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let n: i64 = row.try_get("n").map_err(db_err)?;
        Ok(n as u64)
    }

    async fn insert_many(&self, seats: &[Seat]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for seat in seats {
            sqlx::query(
                "INSERT INTO seats \
                 (id, trip_id, code, floor, seat_type, status, hold_until, passenger, \
                  occupancy_log, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 ON CONFLICT (trip_id, code) DO NOTHING",
            )
            .bind(seat.id)
            .bind(seat.trip_id)
            .bind(&seat.code)
            .bind(seat.floor)
            .bind(&seat.seat_type)
            .bind(seat.status.to_string())
            .bind(seat.hold_until)
            .bind(
                seat.passenger
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()
                    .map_err(json_err)?,
            )
            .bind(serde_json::to_value(&seat.occupancy_log).map_err(json_err)?)
            .bind(seat.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
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
        let row = sqlx::query(&format!(
            "UPDATE seats \
             SET status = 'HELD', passenger = $3, hold_until = $4, updated_at = $5 \
             WHERE trip_id = $1 AND code = $2 \
               AND (status = 'AVAILABLE' OR (status = 'HELD' AND hold_until <= $5)) \
             RETURNING {SEAT_COLUMNS}"
        ))
        .bind(trip_id)
        .bind(code)
        .bind(serde_json::to_value(binding).map_err(json_err)?)
        .bind(hold_until)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(seat_from_row).transpose()
    }

    async fn try_confirm(
        &self,
        trip_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Seat>> {
        let row = sqlx::query(&format!(
            "UPDATE seats \
             SET status = 'CONFIRMED', hold_until = NULL, updated_at = $3 \
             WHERE trip_id = $1 AND code = $2 \
               AND status = 'HELD' AND hold_until > $3 \
             RETURNING {SEAT_COLUMNS}"
        ))
        .bind(trip_id)
        .bind(code)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(seat_from_row).transpose()
    }

    async fn release(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>> {
        let row = sqlx::query(&format!(
            "UPDATE seats \
             SET status = 'AVAILABLE', passenger = NULL, hold_until = NULL, updated_at = $3 \
             WHERE trip_id = $1 AND code = $2 \
             RETURNING {SEAT_COLUMNS}"
        ))
        .bind(trip_id)
        .bind(code)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(seat_from_row).transpose()
    }

    async fn release_if_expired(
        &self,
        trip_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE seats \
             SET status = 'AVAILABLE', passenger = NULL, hold_until = NULL, updated_at = $3 \
             WHERE trip_id = $1 AND code = $2 \
               AND status = 'HELD' AND hold_until <= $3",
        )
        .bind(trip_id)
        .bind(code)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn try_mark_boarded(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>> {
        let row = sqlx::query(&format!(
            "UPDATE seats \
             SET passenger = jsonb_set(passenger, '{{boarded}}', 'true'), updated_at = $3 \
             WHERE trip_id = $1 AND code = $2 \
               AND status = 'CONFIRMED' AND passenger IS NOT NULL \
             RETURNING {SEAT_COLUMNS}"
        ))
        .bind(trip_id)
        .bind(code)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(seat_from_row).transpose()
    }

    async fn try_mark_landed(&self, trip_id: Uuid, code: &str) -> StoreResult<Option<Seat>> {
        // The finished binding moves into the occupancy log in the same
        // write that frees the seat.
        let row = sqlx::query(&format!(
            "UPDATE seats \
             SET status = 'AVAILABLE', \
                 occupancy_log = occupancy_log || jsonb_build_array( \
                     jsonb_set(jsonb_set(passenger, '{{boarded}}', 'true'), '{{landed}}', 'true')), \
                 passenger = NULL, hold_until = NULL, updated_at = $3 \
             WHERE trip_id = $1 AND code = $2 \
               AND status = 'CONFIRMED' AND passenger IS NOT NULL \
             RETURNING {SEAT_COLUMNS}"
        ))
        .bind(trip_id)
        .bind(code)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(seat_from_row).transpose()
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE seats \
             SET status = 'AVAILABLE', passenger = NULL, hold_until = NULL, updated_at = $1 \
             WHERE status = 'HELD' AND hold_until <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected())
    }
}

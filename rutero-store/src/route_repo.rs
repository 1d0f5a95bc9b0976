use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use rutero_core::layout::SeatLayout;
use rutero_core::repository::{
    RouteTemplateRepository, SeatLayoutRepository, StoreResult,
};
use rutero_core::route::RouteTemplate;

use crate::{db_err, json_err};

pub struct PgRouteTemplateRepository {
    pub pool: PgPool,
}

const ROUTE_COLUMNS: &str =
    "id, name, start_time, duration_minutes, stops, layout_id, recurrence, last_generated";

fn route_from_row(row: &PgRow) -> StoreResult<RouteTemplate> {
    Ok(RouteTemplate {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        start_time: row
            .try_get::<Option<i32>, _>("start_time")
            .map_err(db_err)?
            .map(|v| v as u32),
        duration_minutes: row
            .try_get::<Option<i32>, _>("duration_minutes")
            .map_err(db_err)?
            .map(|v| v as u32),
        stops: serde_json::from_value(row.try_get("stops").map_err(db_err)?).map_err(json_err)?,
        layout_id: row.try_get("layout_id").map_err(db_err)?,
        recurrence: serde_json::from_value(row.try_get("recurrence").map_err(db_err)?)
            .map_err(json_err)?,
        last_generated: row.try_get("last_generated").map_err(db_err)?,
    })
}

#[async_trait]
impl RouteTemplateRepository for PgRouteTemplateRepository {
    async fn get(&self, id: Uuid) -> StoreResult<Option<RouteTemplate>> {
        let row = sqlx::query(&format!(
            "SELECT {ROUTE_COLUMNS} FROM route_templates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(route_from_row).transpose()
    }

    async fn list_active(&self) -> StoreResult<Vec<RouteTemplate>> {
        let rows = sqlx::query(&format!(
            "SELECT {ROUTE_COLUMNS} FROM route_templates \
             WHERE (recurrence ->> 'active')::boolean ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(route_from_row).collect()
    }

    async fn insert(&self, template: &RouteTemplate) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO route_templates \
             (id, name, start_time, duration_minutes, stops, layout_id, recurrence, last_generated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(template.start_time.map(|v| v as i32))
        .bind(template.duration_minutes.map(|v| v as i32))
        .bind(serde_json::to_value(&template.stops).map_err(json_err)?)
        .bind(template.layout_id)
        .bind(serde_json::to_value(&template.recurrence).map_err(json_err)?)
        .bind(template.last_generated)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn advance_watermark(&self, id: Uuid, through: NaiveDate) -> StoreResult<()> {
        // Monotonic by predicate: a later watermark is never overwritten.
        sqlx::query(
            "UPDATE route_templates SET last_generated = $2 \
             WHERE id = $1 AND (last_generated IS NULL OR last_generated < $2)",
        )
        .bind(id)
        .bind(through)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}

pub struct PgSeatLayoutRepository {
    pub pool: PgPool,
}

#[async_trait]
impl SeatLayoutRepository for PgSeatLayoutRepository {
    async fn get(&self, id: Uuid) -> StoreResult<Option<SeatLayout>> {
        let row = sqlx::query("SELECT id, name, decks FROM seat_layouts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|row| {
            Ok(SeatLayout {
                id: row.try_get("id").map_err(db_err)?,
                name: row.try_get("name").map_err(db_err)?,
                decks: serde_json::from_value(row.try_get("decks").map_err(db_err)?)
                    .map_err(json_err)?,
            })
        })
        .transpose()
    }

    async fn insert(&self, layout: &SeatLayout) -> StoreResult<()> {
        sqlx::query("INSERT INTO seat_layouts (id, name, decks) VALUES ($1, $2, $3)")
            .bind(layout.id)
            .bind(&layout.name)
            .bind(serde_json::to_value(&layout.decks).map_err(json_err)?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }
}

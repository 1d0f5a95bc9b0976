use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rutero_core::error::CoreError;
use rutero_core::route::{RecurrenceRule, RouteTemplate};
use rutero_schedule::GenerationSummary;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/generation/run", post(run_generation))
        .route("/v1/routes/{id}/generation", get(generation_status))
}

#[derive(Debug, Default, Deserialize)]
struct RunGenerationRequest {
    /// When present, only this template is expanded.
    route_template_id: Option<Uuid>,
}

async fn run_generation(
    State(state): State<AppState>,
    body: Option<Json<RunGenerationRequest>>,
) -> Result<Json<GenerationSummary>, AppError> {
    let Json(req) = body.unwrap_or_default();
    let today = state.local_today();

    let summary = match req.route_template_id {
        Some(id) => {
            let route = state
                .routes
                .get(id)
                .await
                .map_err(CoreError::from)?
                .ok_or_else(|| CoreError::NotFound(format!("route template {id}")))?;
            let report = state.expansion.expand_route(&route, today).await?;
            GenerationSummary::single(report)
        }
        None => state.expansion.expand_all(today).await?,
    };

    Ok(Json(summary))
}

/// Audit view of one template's generation state.
#[derive(Debug, Serialize)]
struct GenerationStatusResponse {
    route_template_id: Uuid,
    route_name: String,
    last_generated: Option<chrono::NaiveDate>,
    recurrence: RecurrenceRule,
}

impl GenerationStatusResponse {
    fn from_route(route: RouteTemplate) -> Self {
        Self {
            route_template_id: route.id,
            route_name: route.name,
            last_generated: route.last_generated,
            recurrence: route.recurrence,
        }
    }
}

async fn generation_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GenerationStatusResponse>, AppError> {
    let route = state
        .routes
        .get(id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::NotFound(format!("route template {id}")))?;
    Ok(Json(GenerationStatusResponse::from_route(route)))
}

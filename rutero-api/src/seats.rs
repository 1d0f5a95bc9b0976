use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use rutero_core::seat::{PassengerBinding, Seat};
use rutero_reservation::ReserveRequest;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips/{trip_id}/seats", get(list_seats))
        .route("/v1/trips/{trip_id}/seats/{code}/hold", post(hold_seat))
        .route("/v1/trips/{trip_id}/seats/{code}/confirm", post(confirm_seat))
        .route("/v1/trips/{trip_id}/seats/{code}/release", post(release_seat))
        .route("/v1/trips/{trip_id}/seats/{code}/board", post(board_seat))
        .route("/v1/trips/{trip_id}/seats/{code}/land", post(land_seat))
}

#[derive(Debug, Serialize)]
struct SeatView {
    code: String,
    floor: i16,
    seat_type: Option<String>,
    status: String,
    hold_until: Option<DateTime<Utc>>,
    passenger: Option<PassengerBinding>,
}

impl From<Seat> for SeatView {
    fn from(seat: Seat) -> Self {
        Self {
            code: seat.code,
            floor: seat.floor,
            seat_type: seat.seat_type,
            status: seat.status.to_string(),
            hold_until: seat.hold_until,
            passenger: seat.passenger,
        }
    }
}

#[derive(Debug, Serialize)]
struct SeatActionResponse {
    status: String,
    seat: SeatView,
}

impl SeatActionResponse {
    fn new(status: &str, seat: Seat) -> Self {
        Self {
            status: status.to_string(),
            seat: seat.into(),
        }
    }
}

async fn list_seats(
    State(state): State<AppState>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Vec<SeatView>>, AppError> {
    let seats = state.reservations.seats_for_trip(trip_id).await?;
    Ok(Json(seats.into_iter().map(SeatView::from).collect()))
}

async fn hold_seat(
    State(state): State<AppState>,
    Path((trip_id, code)): Path<(Uuid, String)>,
    Json(req): Json<ReserveRequest>,
) -> Result<Json<SeatActionResponse>, AppError> {
    let seat = state
        .reservations
        .reserve(trip_id, &code, req, Utc::now())
        .await?;
    Ok(Json(SeatActionResponse::new("HELD", seat)))
}

async fn confirm_seat(
    State(state): State<AppState>,
    Path((trip_id, code)): Path<(Uuid, String)>,
) -> Result<Json<SeatActionResponse>, AppError> {
    let seat = state
        .reservations
        .confirm(trip_id, &code, Utc::now())
        .await?;
    Ok(Json(SeatActionResponse::new("CONFIRMED", seat)))
}

async fn release_seat(
    State(state): State<AppState>,
    Path((trip_id, code)): Path<(Uuid, String)>,
) -> Result<Json<SeatActionResponse>, AppError> {
    let seat = state.reservations.release(trip_id, &code).await?;
    Ok(Json(SeatActionResponse::new("RELEASED", seat)))
}

async fn board_seat(
    State(state): State<AppState>,
    Path((trip_id, code)): Path<(Uuid, String)>,
) -> Result<Json<SeatActionResponse>, AppError> {
    let seat = state.reservations.mark_boarded(trip_id, &code).await?;
    Ok(Json(SeatActionResponse::new("BOARDED", seat)))
}

async fn land_seat(
    State(state): State<AppState>,
    Path((trip_id, code)): Path<(Uuid, String)>,
) -> Result<Json<SeatActionResponse>, AppError> {
    let seat = state.reservations.mark_landed(trip_id, &code).await?;
    Ok(Json(SeatActionResponse::new("LANDED", seat)))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use carpool_booking::Booking;
use carpool_core::Identity;
use carpool_trip::{Trip, TripDraft};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip))
        .route("/v1/trips/{id}", get(get_trip))
        .route("/v1/trips/{id}/cancel", post(cancel_trip))
        .route("/v1/trips/{id}/bookings", get(list_trip_bookings))
}

async fn create_trip(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(draft): Json<TripDraft>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state.trips.create_trip(&identity, draft).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.get_trip(id).await?))
}

async fn cancel_trip(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    Ok(Json(state.trips.cancel_trip(&identity, id).await?))
}

async fn list_trip_bookings(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_trip_bookings(&identity, id).await?))
}

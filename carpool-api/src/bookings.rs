use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use carpool_booking::{Booking, BookingReceipt, CancelBookingRequest, CreateBookingRequest};
use carpool_core::{BookingError, Identity};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CancellationResponse {
    pub message: &'static str,
    pub booking: Booking,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingReceipt>), AppError> {
    let receipt = state.bookings.create_booking(&identity, req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_my_bookings(&identity).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get_booking(&identity, id).await?))
}

/// The body is optional; an empty one cancels without a reason
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<CancellationResponse>, AppError> {
    let req = if body.is_empty() {
        CancelBookingRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| BookingError::Validation(format!("invalid request body: {}", e)))?
    };

    let outcome = state.bookings.cancel_booking(&identity, id, req).await?;
    Ok(Json(CancellationResponse {
        message: outcome.message(),
        booking: outcome.booking().clone(),
    }))
}

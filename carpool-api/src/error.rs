use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use carpool_core::{BookingError, ErrorKind};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Booking(#[from] BookingError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Booking(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal Server Error: {}", self);
            "Internal Server Error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

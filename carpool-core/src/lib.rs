pub mod distance;
pub mod events;
pub mod identity;

pub use distance::{Coordinates, DistanceResolver, FallbackResolver, GeodesicResolver, ResolutionError};
pub use events::{BookingEvent, EventPublisher, NoopPublisher};
pub use identity::{Identity, Role};

use uuid::Uuid;

/// Coarse classification of a failure, used by outer surfaces to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Trip {0} is not open for booking")]
    NotBookable(Uuid),

    #[error("Passenger already holds an active booking on trip {0}")]
    DuplicateBooking(Uuid),

    #[error("No seats available on trip {0}")]
    NoSeatsAvailable(Uuid),

    #[error("Trip {0} has no usable route distance")]
    InvalidTripDistance(Uuid),

    #[error("Invalid fare input: {0}")]
    InvalidFareInput(String),

    #[error("Internal service error: {0}")]
    Internal(String),
}

impl BookingError {
    pub fn trip_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "Trip", id }
    }

    pub fn booking_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "Booking", id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::InvalidTripDistance(_) | Self::InvalidFareInput(_) => {
                ErrorKind::Validation
            }
            Self::Forbidden(_) => ErrorKind::Authorization,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotBookable(_) | Self::DuplicateBooking(_) | Self::NoSeatsAvailable(_) => {
                ErrorKind::Conflict
            }
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type CoreResult<T> = Result<T, BookingError>;

/// Representation noise below this many cents is discarded before rounding
const CENT_SNAP: f64 = 1e6;

/// Half-up rounding to two decimal places for non-negative monetary amounts.
///
/// Rounds the decimal amount rather than its binary approximation, so 1.005 becomes 1.01.
pub fn round2(value: f64) -> f64 {
    let cents = (value * 100.0 * CENT_SNAP).round() / CENT_SNAP;
    cents.round() / 100.0
}

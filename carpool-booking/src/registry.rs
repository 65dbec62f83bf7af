use carpool_core::{BookingError, CoreResult};
use carpool_trip::{SeatError, Trip};
use std::sync::Arc;
use uuid::Uuid;

use crate::store::{Database, UnitOfWork};

/// Owns trip rows and their seat counters
#[derive(Clone)]
pub struct TripRegistry {
    db: Arc<dyn Database>,
}

impl TripRegistry {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn register(&self, trip: &Trip) -> CoreResult<()> {
        self.db.insert_trip(trip).await?;
        Ok(())
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.db
            .find_trip(trip_id)
            .await?
            .ok_or_else(|| BookingError::trip_not_found(trip_id))
    }

    /// Unlocked read; only scheduled trips pass
    pub async fn get_trip_for_booking(&self, trip_id: Uuid) -> CoreResult<Trip> {
        let trip = self.get_trip(trip_id).await?;
        if !trip.is_bookable() {
            return Err(BookingError::NotBookable(trip_id));
        }
        Ok(trip)
    }

    pub async fn lock_trip(&self, uow: &mut dyn UnitOfWork, trip_id: Uuid) -> CoreResult<Trip> {
        uow.lock_trip(trip_id)
            .await?
            .ok_or_else(|| BookingError::trip_not_found(trip_id))
    }

    /// Lock the trip row, re-check status and seats, and take one seat.
    ///
    /// The decrement only becomes visible when the caller commits `uow`.
    pub async fn reserve_seat(&self, uow: &mut dyn UnitOfWork, trip_id: Uuid) -> CoreResult<Trip> {
        let mut trip = self.lock_trip(uow, trip_id).await?;

        if !trip.is_bookable() {
            return Err(BookingError::NotBookable(trip_id));
        }

        trip.take_seat().map_err(|e| match e {
            SeatError::Exhausted { .. } => BookingError::NoSeatsAvailable(trip_id),
            other => BookingError::Internal(other.to_string()),
        })?;

        uow.save_trip_seats(&trip).await?;
        Ok(trip)
    }

    /// Give a seat back. `trip` must already be locked through `uow`.
    pub async fn release_seat(&self, uow: &mut dyn UnitOfWork, trip: &mut Trip) -> CoreResult<()> {
        trip.return_seat().map_err(|e| {
            tracing::error!(trip_id = %trip.id, error = %e, "Seat inventory out of sync with bookings");
            BookingError::Internal(e.to_string())
        })?;

        uow.save_trip_seats(trip).await?;
        Ok(())
    }
}

use async_trait::async_trait;
use carpool_core::BookingError;
use carpool_trip::Trip;
use uuid::Uuid;

use crate::models::Booking;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        BookingError::Internal(err.to_string())
    }
}

/// One storage transaction.
///
/// Row locks taken here are held until `commit`. Dropping a unit of work without
/// committing rolls back every write made through it.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read the trip and hold an exclusive lock on its row
    async fn lock_trip(&mut self, trip_id: Uuid) -> StoreResult<Option<Trip>>;

    /// Read the booking and hold an exclusive lock on its row
    async fn lock_booking(&mut self, booking_id: Uuid) -> StoreResult<Option<Booking>>;

    async fn save_trip_seats(&mut self, trip: &Trip) -> StoreResult<()>;

    async fn save_trip_status(&mut self, trip: &Trip) -> StoreResult<()>;

    /// Fails with `StoreError::Conflict` if the passenger already holds an active booking on the trip
    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn save_booking_status(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()>;

    async fn find_trip(&self, trip_id: Uuid) -> StoreResult<Option<Trip>>;

    async fn find_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>>;

    async fn find_active_booking(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> StoreResult<Option<Booking>>;

    async fn count_active_bookings(&self, trip_id: Uuid) -> StoreResult<i64>;

    async fn list_trip_bookings(&self, trip_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn list_passenger_bookings(&self, passenger_id: Uuid) -> StoreResult<Vec<Booking>>;
}

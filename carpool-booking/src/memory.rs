use async_trait::async_trait;
use carpool_trip::Trip;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::models::Booking;
use crate::store::{Database, StoreError, StoreResult, UnitOfWork};

const NO_INJECTED_FAILURE: usize = usize::MAX;

#[derive(Debug, Clone, Default)]
struct Tables {
    trips: HashMap<Uuid, Trip>,
    bookings: HashMap<Uuid, Booking>,
}

impl Tables {
    fn active_booking(&self, trip_id: Uuid, passenger_id: Uuid) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.trip_id == trip_id && b.passenger_id == passenger_id && b.is_active())
    }

    fn sorted_bookings(&self, filter: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut bookings: Vec<Booking> =
            self.bookings.values().filter(|b| filter(b)).cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }
}

/// In-process store for local runs and tests.
///
/// Units of work are serialized through `writer`. Each one edits a staged copy of the
/// tables that replaces the live copy only on commit.
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    writer: Arc<tokio::sync::Mutex<()>>,
    fail_after: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            writer: Arc::new(tokio::sync::Mutex::new(())),
            fail_after: Arc::new(AtomicUsize::new(NO_INJECTED_FAILURE)),
        }
    }

    /// Insert or overwrite a trip row directly, skipping validation.
    ///
    /// Panics if a unit of work is open, since its commit would drop the row.
    #[cfg(test)]
    pub(crate) fn seed_trip(&self, trip: Trip) {
        let _writer = self
            .writer
            .try_lock()
            .expect("seed_trip called while a unit of work is open");
        self.read().trips.insert(trip.id, trip);
    }

    /// Allow `writes` more successful writes, then fail the next one
    #[cfg(test)]
    pub(crate) fn fail_write_after(&self, writes: usize) {
        self.fail_after.store(writes, Ordering::SeqCst);
    }

    fn read(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryUnitOfWork {
    _writer: OwnedMutexGuard<()>,
    live: Arc<Mutex<Tables>>,
    staged: Tables,
    fail_after: Arc<AtomicUsize>,
}

impl MemoryUnitOfWork {
    fn check_write(&self) -> StoreResult<()> {
        let remaining = self.fail_after.load(Ordering::SeqCst);
        match remaining {
            NO_INJECTED_FAILURE => Ok(()),
            0 => {
                self.fail_after.store(NO_INJECTED_FAILURE, Ordering::SeqCst);
                Err(StoreError::Backend("injected write failure".into()))
            }
            n => {
                self.fail_after.store(n - 1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn trip_row(&mut self, trip_id: Uuid) -> StoreResult<&mut Trip> {
        self.staged
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| StoreError::Backend(format!("trip {} does not exist", trip_id)))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_trip(&mut self, trip_id: Uuid) -> StoreResult<Option<Trip>> {
        Ok(self.staged.trips.get(&trip_id).cloned())
    }

    async fn lock_booking(&mut self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.staged.bookings.get(&booking_id).cloned())
    }

    async fn save_trip_seats(&mut self, trip: &Trip) -> StoreResult<()> {
        self.check_write()?;
        if trip.available_seats < 0 || trip.available_seats > trip.max_seats {
            return Err(StoreError::Backend(format!(
                "available_seats {} out of range for trip {}",
                trip.available_seats, trip.id
            )));
        }
        let row = self.trip_row(trip.id)?;
        row.available_seats = trip.available_seats;
        row.updated_at = trip.updated_at;
        Ok(())
    }

    async fn save_trip_status(&mut self, trip: &Trip) -> StoreResult<()> {
        self.check_write()?;
        let row = self.trip_row(trip.id)?;
        row.status = trip.status;
        row.updated_at = trip.updated_at;
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.check_write()?;
        if !self.staged.trips.contains_key(&booking.trip_id) {
            return Err(StoreError::Backend(format!(
                "trip {} does not exist",
                booking.trip_id
            )));
        }
        if self.staged.bookings.contains_key(&booking.id) {
            return Err(StoreError::Conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        if booking.is_active()
            && self
                .staged
                .active_booking(booking.trip_id, booking.passenger_id)
                .is_some()
        {
            return Err(StoreError::Conflict(
                "passenger already holds an active booking on this trip".into(),
            ));
        }
        self.staged.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn save_booking_status(&mut self, booking: &Booking) -> StoreResult<()> {
        self.check_write()?;
        let row = self.staged.bookings.get_mut(&booking.id).ok_or_else(|| {
            StoreError::Backend(format!("booking {} does not exist", booking.id))
        })?;
        row.booking_status = booking.booking_status;
        row.cancellation_reason = booking.cancellation_reason.clone();
        row.cancelled_by = booking.cancelled_by;
        row.cancelled_at = booking.cancelled_at;
        row.updated_at = booking.updated_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let uow = *self;
        let mut live = uow.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *live = uow.staged;
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let writer = self.writer.clone().lock_owned().await;
        let staged = self.read().clone();
        Ok(Box::new(MemoryUnitOfWork {
            _writer: writer,
            live: self.tables.clone(),
            staged,
            fail_after: self.fail_after.clone(),
        }))
    }

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()> {
        // Wait out any open unit of work so its commit cannot drop this row
        let _writer = self.writer.lock().await;
        let mut tables = self.read();
        if tables.trips.contains_key(&trip.id) {
            return Err(StoreError::Conflict(format!("trip {} already exists", trip.id)));
        }
        tables.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn find_trip(&self, trip_id: Uuid) -> StoreResult<Option<Trip>> {
        Ok(self.read().trips.get(&trip_id).cloned())
    }

    async fn find_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.read().bookings.get(&booking_id).cloned())
    }

    async fn find_active_booking(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> StoreResult<Option<Booking>> {
        Ok(self.read().active_booking(trip_id, passenger_id).cloned())
    }

    async fn count_active_bookings(&self, trip_id: Uuid) -> StoreResult<i64> {
        let count = self
            .read()
            .bookings
            .values()
            .filter(|b| b.trip_id == trip_id && b.is_active())
            .count();
        Ok(count as i64)
    }

    async fn list_trip_bookings(&self, trip_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(self.read().sorted_bookings(|b| b.trip_id == trip_id))
    }

    async fn list_passenger_bookings(&self, passenger_id: Uuid) -> StoreResult<Vec<Booking>> {
        Ok(self.read().sorted_bookings(|b| b.passenger_id == passenger_id))
    }
}

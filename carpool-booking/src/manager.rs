use carpool_core::{
    BookingError, BookingEvent, CoreResult, EventPublisher, FallbackResolver, Identity, Role,
};
use carpool_trip::{FareEngine, FareInput, Trip, MAX_SEATS_PER_TRIP};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{
    Booking, BookingReceipt, BookingStatus, CancelBookingRequest, CancellationOutcome,
    CreateBookingRequest,
};
use crate::registry::TripRegistry;
use crate::store::{Database, StoreError};

/// Runs the booking and cancellation transactions
pub struct BookingManager {
    db: Arc<dyn Database>,
    registry: TripRegistry,
    distance: FallbackResolver,
    fare: FareEngine,
    events: Arc<dyn EventPublisher>,
}

impl BookingManager {
    pub fn new(
        db: Arc<dyn Database>,
        distance: FallbackResolver,
        fare: FareEngine,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry: TripRegistry::new(db.clone()),
            db,
            distance,
            fare,
            events,
        }
    }

    pub fn registry(&self) -> &TripRegistry {
        &self.registry
    }

    /// Book one seat for the calling passenger.
    ///
    /// Everything up to pricing runs without locks. Seats are re-checked under the
    /// trip row lock, and the booking insert and seat decrement commit together.
    pub async fn create_booking(
        &self,
        identity: &Identity,
        req: CreateBookingRequest,
    ) -> CoreResult<BookingReceipt> {
        // 1. Validate
        identity.require_role(Role::Passenger)?;
        req.validate()?;

        // 2. Load trip (fast-fail only, not authoritative)
        let trip = self.registry.get_trip_for_booking(req.trip_id).await?;
        if trip.is_driven_by(identity.user_id) {
            return Err(BookingError::Validation("drivers cannot book their own trip".into()));
        }
        if trip.available_seats <= 0 {
            return Err(BookingError::NoSeatsAvailable(trip.id));
        }

        // 3. Duplicate pre-check; the unique index on insert is the real guard
        if self
            .db
            .find_active_booking(trip.id, identity.user_id)
            .await?
            .is_some()
        {
            return Err(BookingError::DuplicateBooking(trip.id));
        }

        // 4. Passenger distance, outside any lock
        let pickup = req.pickup();
        let dropoff = req.dropoff();
        let distance_km = self
            .distance
            .distance_km(pickup.coordinates(), dropoff.coordinates())
            .await;
        if distance_km <= 0.0 {
            return Err(BookingError::Validation(
                "pickup and dropoff must be different locations".into(),
            ));
        }

        // 5-7. Price
        let partial_distance_factor = self
            .fare
            .partial_distance_factor(distance_km, trip.total_distance_km)
            .ok_or(BookingError::InvalidTripDistance(trip.id))?;
        let passenger_count = self.passenger_count(&trip).await?;
        let quote = self.fare.quote(&FareInput {
            distance_km: trip.total_distance_km,
            fuel_rate_per_km: trip.fuel_rate_per_km,
            vehicle_factor: trip.vehicle_factor,
            passenger_count,
            partial_distance_factor,
        })?;

        let booking = Booking::confirmed(trip.id, identity.user_id, pickup, dropoff, distance_km, &quote);

        // 8. Atomic section; an early return drops `uow` and rolls back
        let mut uow = self.db.begin().await?;
        let reserved = self.registry.reserve_seat(uow.as_mut(), trip.id).await?;
        uow.insert_booking(&booking).await.map_err(|e| match e {
            StoreError::Conflict(_) => BookingError::DuplicateBooking(trip.id),
            other => BookingError::from(other),
        })?;
        uow.commit().await?;

        info!(
            booking_id = %booking.id,
            trip_id = %trip.id,
            passenger_id = %identity.user_id,
            passenger_cost = booking.passenger_cost,
            available_seats = reserved.available_seats,
            "Booking confirmed"
        );

        self.publish(BookingEvent::Confirmed {
            booking_id: booking.id,
            trip_id: trip.id,
            passenger_id: identity.user_id,
            passenger_cost: booking.passenger_cost,
            available_seats: reserved.available_seats,
            occurred_at: Utc::now().timestamp(),
        })
        .await;

        // 9. Booking plus pricing breakdown
        Ok(BookingReceipt {
            pricing: booking.pricing(),
            booking,
        })
    }

    /// Cancel a booking and hand its seat back.
    ///
    /// Locks the booking row, then the trip row. Cancelling twice is a no-op.
    pub async fn cancel_booking(
        &self,
        identity: &Identity,
        booking_id: Uuid,
        req: CancelBookingRequest,
    ) -> CoreResult<CancellationOutcome> {
        let mut uow = self.db.begin().await?;

        let mut booking = uow
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::booking_not_found(booking_id))?;
        let mut trip = self.registry.lock_trip(uow.as_mut(), booking.trip_id).await?;

        Self::authorize(identity, &booking, &trip)?;

        if booking.booking_status == BookingStatus::Cancelled {
            return Ok(CancellationOutcome::AlreadyCancelled(booking));
        }
        if booking.booking_status == BookingStatus::Completed {
            return Err(BookingError::Validation("completed bookings cannot be cancelled".into()));
        }

        let reason = req
            .cancellation_reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        booking.cancel(reason, identity.user_id);

        uow.save_booking_status(&booking).await?;
        self.registry.release_seat(uow.as_mut(), &mut trip).await?;
        uow.commit().await?;

        info!(
            booking_id = %booking.id,
            trip_id = %trip.id,
            cancelled_by = %identity.user_id,
            available_seats = trip.available_seats,
            "Booking cancelled"
        );

        self.publish(BookingEvent::Cancelled {
            booking_id: booking.id,
            trip_id: trip.id,
            cancelled_by: identity.user_id,
            available_seats: trip.available_seats,
            occurred_at: Utc::now().timestamp(),
        })
        .await;

        Ok(CancellationOutcome::Cancelled(booking))
    }

    /// Visible to the passenger, the trip's driver and admins
    pub async fn get_booking(&self, identity: &Identity, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self
            .db
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::booking_not_found(booking_id))?;
        let trip = self.registry.get_trip(booking.trip_id).await?;

        Self::authorize(identity, &booking, &trip)?;
        Ok(booking)
    }

    pub async fn list_my_bookings(&self, identity: &Identity) -> CoreResult<Vec<Booking>> {
        Ok(self.db.list_passenger_bookings(identity.user_id).await?)
    }

    /// Visible to the trip's driver and admins
    pub async fn list_trip_bookings(&self, identity: &Identity, trip_id: Uuid) -> CoreResult<Vec<Booking>> {
        let trip = self.registry.get_trip(trip_id).await?;
        if !identity.is_admin() && !trip.is_driven_by(identity.user_id) {
            return Err(BookingError::Forbidden("only the trip's driver can view its bookings".into()));
        }
        Ok(self.db.list_trip_bookings(trip_id).await?)
    }

    /// Active riders including the one being priced, capped at the trip's capacity
    async fn passenger_count(&self, trip: &Trip) -> CoreResult<i32> {
        let active = self.db.count_active_bookings(trip.id).await?;
        let cap = trip.max_seats.clamp(1, MAX_SEATS_PER_TRIP) as i64;
        Ok((active + 1).clamp(1, cap) as i32)
    }

    fn authorize(identity: &Identity, booking: &Booking, trip: &Trip) -> CoreResult<()> {
        if identity.is_admin()
            || booking.passenger_id == identity.user_id
            || trip.is_driven_by(identity.user_id)
        {
            return Ok(());
        }
        Err(BookingError::Forbidden("not a party to this booking".into()))
    }

    async fn publish(&self, event: BookingEvent) {
        if let Err(e) = self.events.publish(&event).await {
            warn!(topic = event.topic(), error = %e, "Failed to publish booking event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use carpool_core::NoopPublisher;
    use carpool_trip::{FareConfig, Place, TripDraft};
    use chrono::{NaiveDate, NaiveTime};

    // 0.1 degrees of latitude is about 11.12 km
    const DEG_KM: f64 = 111.194_926_644_558_73;

    struct Fixture {
        store: Arc<MemoryStore>,
        manager: BookingManager,
        trip: Trip,
    }

    fn fixture(max_seats: i32) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let manager = BookingManager::new(
            store.clone(),
            FallbackResolver::geodesic_only(),
            FareEngine::new(FareConfig::default()),
            Arc::new(NoopPublisher),
        );

        // 20 km due north along a meridian
        let end_lat = 20.0 / DEG_KM;
        let draft = TripDraft {
            vehicle_id: Uuid::new_v4(),
            schedule_date: NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
            schedule_time: NaiveTime::from_hms_opt(7, 45, 0).unwrap(),
            origin: Place::new("Depot", 0.0, 0.0),
            destination: Place::new("Campus", end_lat, 0.0),
            waypoints: vec![],
            max_seats,
            vehicle_type: "hatchback".into(),
            fuel_rate_per_km: Some(25.0),
            is_women_only: false,
        };
        let trip = Trip::publish(Uuid::new_v4(), draft, 20.0, 25.0, 1.0);
        store.seed_trip(trip.clone());

        Fixture { store, manager, trip }
    }

    fn request(trip_id: Uuid, km: f64) -> CreateBookingRequest {
        CreateBookingRequest {
            trip_id,
            pickup_address: "Gate 1".into(),
            pickup_latitude: 0.0,
            pickup_longitude: 0.0,
            dropoff_address: "Gate 2".into(),
            dropoff_latitude: km / DEG_KM,
            dropoff_longitude: 0.0,
        }
    }

    async fn seats(f: &Fixture) -> i32 {
        f.manager.registry().get_trip(f.trip.id).await.unwrap().available_seats
    }

    #[tokio::test]
    async fn test_worked_fare_example() {
        let f = fixture(3);

        let first = f
            .manager
            .create_booking(&Identity::passenger(Uuid::new_v4()), request(f.trip.id, 20.0))
            .await
            .unwrap();
        assert_eq!(first.pricing.partial_distance_factor, 1.0);
        assert_eq!(first.pricing.passenger_cost, 250.0);
        assert_eq!(first.pricing.driver_contribution, 250.0);
        assert_eq!(first.booking.booking_status, BookingStatus::Confirmed);

        let second = f
            .manager
            .create_booking(&Identity::passenger(Uuid::new_v4()), request(f.trip.id, 10.0))
            .await
            .unwrap();
        assert!((second.pricing.partial_distance_factor - 0.5).abs() < 1e-9);
        assert_eq!(second.pricing.passenger_cost, 93.75);

        assert_eq!(seats(&f).await, 1);
    }

    #[tokio::test]
    async fn test_no_seats_available() {
        let f = fixture(1);
        f.manager
            .create_booking(&Identity::passenger(Uuid::new_v4()), request(f.trip.id, 5.0))
            .await
            .unwrap();

        let late = Identity::passenger(Uuid::new_v4());
        let err = f
            .manager
            .create_booking(&late, request(f.trip.id, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NoSeatsAvailable(_)));
        assert!(f.manager.list_my_bookings(&late).await.unwrap().is_empty());
        assert_eq!(seats(&f).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_booking_rejected_with_seats_left() {
        let f = fixture(3);
        let passenger = Identity::passenger(Uuid::new_v4());

        f.manager.create_booking(&passenger, request(f.trip.id, 5.0)).await.unwrap();
        let err = f
            .manager
            .create_booking(&passenger, request(f.trip.id, 8.0))
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::DuplicateBooking(_)));
        assert_eq!(seats(&f).await, 2);
    }

    #[tokio::test]
    async fn test_rebooking_after_cancellation_is_allowed() {
        let f = fixture(2);
        let passenger = Identity::passenger(Uuid::new_v4());

        let receipt = f.manager.create_booking(&passenger, request(f.trip.id, 5.0)).await.unwrap();
        f.manager
            .cancel_booking(&passenger, receipt.booking.id, CancelBookingRequest::default())
            .await
            .unwrap();

        f.manager.create_booking(&passenger, request(f.trip.id, 5.0)).await.unwrap();
        assert_eq!(seats(&f).await, 1);
    }

    #[tokio::test]
    async fn test_create_then_cancel_restores_trip() {
        let f = fixture(3);
        let passenger = Identity::passenger(Uuid::new_v4());
        let before = f.manager.registry().get_trip(f.trip.id).await.unwrap();

        let receipt = f.manager.create_booking(&passenger, request(f.trip.id, 12.0)).await.unwrap();
        let outcome = f
            .manager
            .cancel_booking(
                &passenger,
                receipt.booking.id,
                CancelBookingRequest { cancellation_reason: Some("  running late ".into()) },
            )
            .await
            .unwrap();

        let cancelled = outcome.booking();
        assert_eq!(cancelled.booking_status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("running late"));
        assert_eq!(cancelled.cancelled_by, Some(passenger.user_id));

        let after = f.manager.registry().get_trip(f.trip.id).await.unwrap();
        assert_eq!(after.available_seats, before.available_seats);
        assert_eq!(after.total_distance_km, before.total_distance_km);
        assert_eq!(after.base_trip_cost, before.base_trip_cost);
        assert_eq!(after.fuel_rate_per_km, before.fuel_rate_per_km);
    }

    #[tokio::test]
    async fn test_repeated_cancellation_is_idempotent() {
        let f = fixture(2);
        let passenger = Identity::passenger(Uuid::new_v4());
        let receipt = f.manager.create_booking(&passenger, request(f.trip.id, 5.0)).await.unwrap();
        assert_eq!(seats(&f).await, 1);

        let first = f
            .manager
            .cancel_booking(&passenger, receipt.booking.id, CancelBookingRequest::default())
            .await
            .unwrap();
        assert!(matches!(first, CancellationOutcome::Cancelled(_)));

        for _ in 0..3 {
            let again = f
                .manager
                .cancel_booking(&passenger, receipt.booking.id, CancelBookingRequest::default())
                .await
                .unwrap();
            assert!(matches!(again, CancellationOutcome::AlreadyCancelled(_)));
        }
        assert_eq!(seats(&f).await, 2);
    }

    #[tokio::test]
    async fn test_cancellation_authorization() {
        let f = fixture(3);
        let passenger = Identity::passenger(Uuid::new_v4());
        let receipt = f.manager.create_booking(&passenger, request(f.trip.id, 5.0)).await.unwrap();

        let stranger = Identity::passenger(Uuid::new_v4());
        let err = f
            .manager
            .cancel_booking(&stranger, receipt.booking.id, CancelBookingRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Forbidden(_)));
        assert_eq!(seats(&f).await, 2);

        let driver = Identity::driver(f.trip.driver_id);
        f.manager
            .cancel_booking(&driver, receipt.booking.id, CancelBookingRequest::default())
            .await
            .unwrap();
        assert_eq!(seats(&f).await, 3);

        let other = f.manager.create_booking(&stranger, request(f.trip.id, 5.0)).await.unwrap();
        let admin = Identity::admin(Uuid::new_v4());
        f.manager
            .cancel_booking(&admin, other.booking.id, CancelBookingRequest::default())
            .await
            .unwrap();
        assert_eq!(seats(&f).await, 3);
    }

    #[tokio::test]
    async fn test_cancel_unknown_booking() {
        let f = fixture(1);
        let err = f
            .manager
            .cancel_booking(&Identity::admin(Uuid::new_v4()), Uuid::new_v4(), CancelBookingRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "Booking", .. }));
    }

    #[tokio::test]
    async fn test_booking_rejections_leave_no_trace() {
        let f = fixture(3);
        let passenger = Identity::passenger(Uuid::new_v4());

        // Same pickup and dropoff
        let err = f.manager.create_booking(&passenger, request(f.trip.id, 0.0)).await.unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));

        // Drivers and admins do not book seats
        let err = f
            .manager
            .create_booking(&Identity::driver(Uuid::new_v4()), request(f.trip.id, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Forbidden(_)));

        // Unknown trip
        let err = f.manager.create_booking(&passenger, request(Uuid::new_v4(), 5.0)).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "Trip", .. }));

        assert!(f.manager.list_my_bookings(&passenger).await.unwrap().is_empty());
        assert_eq!(seats(&f).await, 3);
    }

    #[tokio::test]
    async fn test_cancelled_trip_is_not_bookable() {
        let f = fixture(3);
        let mut trip = f.trip.clone();
        trip.update_status(carpool_trip::TripStatus::Cancelled);
        f.store.seed_trip(trip);

        let err = f
            .manager
            .create_booking(&Identity::passenger(Uuid::new_v4()), request(f.trip.id, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotBookable(_)));
    }

    #[tokio::test]
    async fn test_zero_distance_trip_rejected() {
        let f = fixture(3);
        let mut trip = f.trip.clone();
        trip.total_distance_km = 0.0;
        f.store.seed_trip(trip);

        let err = f
            .manager
            .create_booking(&Identity::passenger(Uuid::new_v4()), request(f.trip.id, 5.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTripDistance(_)));
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_reservation() {
        let f = fixture(2);
        let passenger = Identity::passenger(Uuid::new_v4());

        // First write in the unit of work is the seat decrement; fail the booking insert after it
        f.store.fail_write_after(1);
        let err = f.manager.create_booking(&passenger, request(f.trip.id, 5.0)).await.unwrap_err();

        assert!(matches!(err, BookingError::Internal(_)));
        assert_eq!(seats(&f).await, 2);
        assert!(f.manager.list_my_bookings(&passenger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_cancellation() {
        let f = fixture(2);
        let passenger = Identity::passenger(Uuid::new_v4());
        let receipt = f.manager.create_booking(&passenger, request(f.trip.id, 5.0)).await.unwrap();

        // Status update succeeds, seat release fails
        f.store.fail_write_after(1);
        let err = f
            .manager
            .cancel_booking(&passenger, receipt.booking.id, CancelBookingRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Internal(_)));

        let booking = f.manager.get_booking(&passenger, receipt.booking.id).await.unwrap();
        assert_eq!(booking.booking_status, BookingStatus::Confirmed);
        assert_eq!(seats(&f).await, 1);
    }

    #[tokio::test]
    async fn test_passenger_count_grows_with_riders() {
        let f = fixture(3);
        let mut costs = Vec::new();
        for _ in 0..3 {
            let receipt = f
                .manager
                .create_booking(&Identity::passenger(Uuid::new_v4()), request(f.trip.id, 20.0))
                .await
                .unwrap();
            costs.push(receipt.pricing.passenger_cost);
        }
        // 500 * (1 - 0.5/n) / n for n = 1, 2, 3
        assert_eq!(costs, vec![250.0, 187.5, 138.89]);
    }

    #[tokio::test]
    async fn test_booking_visibility() {
        let f = fixture(3);
        let passenger = Identity::passenger(Uuid::new_v4());
        let receipt = f.manager.create_booking(&passenger, request(f.trip.id, 5.0)).await.unwrap();

        assert!(f.manager.get_booking(&passenger, receipt.booking.id).await.is_ok());
        assert!(f
            .manager
            .get_booking(&Identity::driver(f.trip.driver_id), receipt.booking.id)
            .await
            .is_ok());
        assert!(matches!(
            f.manager.get_booking(&Identity::passenger(Uuid::new_v4()), receipt.booking.id).await,
            Err(BookingError::Forbidden(_))
        ));

        let listed = f
            .manager
            .list_trip_bookings(&Identity::driver(f.trip.driver_id), f.trip.id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(f.manager.list_trip_bookings(&passenger, f.trip.id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_never_overbook() {
        let f = fixture(3);
        let manager = Arc::new(f.manager);
        let attempts = 12;

        let mut handles = Vec::new();
        for _ in 0..attempts {
            let manager = manager.clone();
            let trip_id = f.trip.id;
            handles.push(tokio::spawn(async move {
                manager
                    .create_booking(&Identity::passenger(Uuid::new_v4()), request(trip_id, 7.0))
                    .await
            }));
        }

        let mut confirmed = 0;
        let mut sold_out = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => confirmed += 1,
                Err(BookingError::NoSeatsAvailable(_)) => sold_out += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(confirmed, 3);
        assert_eq!(sold_out, attempts - 3);

        let trip = manager.registry().get_trip(f.trip.id).await.unwrap();
        let active = f.store.count_active_bookings(f.trip.id).await.unwrap();
        assert_eq!(trip.available_seats, 0);
        assert_eq!(trip.max_seats as i64 - active, trip.available_seats as i64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_seat_invariant_under_mixed_traffic() {
        let f = fixture(3);
        let manager = Arc::new(f.manager);
        let passengers: Vec<Identity> = (0..6).map(|_| Identity::passenger(Uuid::new_v4())).collect();

        let mut handles = Vec::new();
        for passenger in passengers.clone() {
            let manager = manager.clone();
            let trip_id = f.trip.id;
            handles.push(tokio::spawn(async move {
                if let Ok(receipt) = manager.create_booking(&passenger, request(trip_id, 9.0)).await {
                    // Cancel twice concurrently-ish; only one may release the seat
                    let id = receipt.booking.id;
                    let a = manager.cancel_booking(&passenger, id, CancelBookingRequest::default());
                    let b = manager.cancel_booking(&passenger, id, CancelBookingRequest::default());
                    let (a, b) = tokio::join!(a, b);
                    a.unwrap();
                    b.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let trip = manager.registry().get_trip(f.trip.id).await.unwrap();
        let active = f.store.count_active_bookings(f.trip.id).await.unwrap();
        assert_eq!(trip.max_seats as i64 - active, trip.available_seats as i64);
        assert_eq!(trip.available_seats, 3);
    }
}

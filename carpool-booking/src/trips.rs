use carpool_core::{BookingError, CoreResult, FallbackResolver, Identity, Role};
use carpool_trip::{FareConfig, Trip, TripDraft, TripStatus};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::registry::TripRegistry;
use crate::store::Database;

/// Trip publication and trip-level status changes
pub struct TripService {
    db: Arc<dyn Database>,
    registry: TripRegistry,
    distance: FallbackResolver,
    fare: FareConfig,
}

impl TripService {
    pub fn new(db: Arc<dyn Database>, distance: FallbackResolver, fare: FareConfig) -> Self {
        Self {
            registry: TripRegistry::new(db.clone()),
            db,
            distance,
            fare,
        }
    }

    /// Publish a scheduled trip for the calling driver
    pub async fn create_trip(&self, identity: &Identity, draft: TripDraft) -> CoreResult<Trip> {
        identity.require_role(Role::Driver)?;
        draft.validate()?;

        let vehicle_factor = self.fare.vehicle_factor(&draft.vehicle_type).ok_or_else(|| {
            BookingError::Validation(format!("unknown vehicle type '{}'", draft.vehicle_type))
        })?;
        let fuel_rate_per_km = draft
            .fuel_rate_per_km
            .unwrap_or(self.fare.default_fuel_rate_per_km);

        let total_distance_km = self.distance.route_distance_km(&draft.route_points()).await;
        if total_distance_km <= 0.0 {
            return Err(BookingError::Validation(
                "origin and destination must be different locations".into(),
            ));
        }

        let trip = Trip::publish(
            identity.user_id,
            draft,
            total_distance_km,
            fuel_rate_per_km,
            vehicle_factor,
        );
        self.registry.register(&trip).await?;

        info!(
            trip_id = %trip.id,
            driver_id = %trip.driver_id,
            total_distance_km = trip.total_distance_km,
            max_seats = trip.max_seats,
            "Trip published"
        );
        Ok(trip)
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.registry.get_trip(trip_id).await
    }

    /// Cancel a whole trip. Repeating the call on a cancelled trip is a no-op.
    pub async fn cancel_trip(&self, identity: &Identity, trip_id: Uuid) -> CoreResult<Trip> {
        let mut uow = self.db.begin().await?;
        let mut trip = self.registry.lock_trip(uow.as_mut(), trip_id).await?;

        if !identity.is_admin() && !trip.is_driven_by(identity.user_id) {
            return Err(BookingError::Forbidden("only the trip's driver can cancel it".into()));
        }

        match trip.status {
            TripStatus::Cancelled => return Ok(trip),
            TripStatus::Completed => {
                return Err(BookingError::Validation("completed trips cannot be cancelled".into()))
            }
            TripStatus::Scheduled => {}
        }

        trip.update_status(TripStatus::Cancelled);
        uow.save_trip_status(&trip).await?;
        uow.commit().await?;

        info!(trip_id = %trip.id, cancelled_by = %identity.user_id, "Trip cancelled");
        Ok(trip)
    }
}

use carpool_booking::{BookingManager, TripService};
use carpool_store::RedisClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub trips: Arc<TripService>,
    pub bookings: Arc<BookingManager>,
    /// Rate limiting is skipped when absent
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
}

pub mod trip;
pub mod pricing;
pub mod inventory;

pub use trip::{Place, Trip, TripDraft, TripStatus, Waypoint, MAX_SEATS_PER_TRIP};
pub use pricing::{DriverShareScaling, FareConfig, FareEngine, FareError, FareInput, FareQuote};
pub use inventory::SeatError;

pub mod models;
pub mod store;
pub mod registry;
pub mod manager;
pub mod trips;
pub mod memory;

pub use models::{
    Booking, BookingReceipt, BookingStatus, CancelBookingRequest, CancellationOutcome,
    CreateBookingRequest, PaymentStatus, PricingBreakdown,
};
pub use store::{Database, StoreError, StoreResult, UnitOfWork};
pub use registry::TripRegistry;
pub use manager::BookingManager;
pub use trips::TripService;
pub use memory::MemoryStore;

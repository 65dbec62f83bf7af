use carpool_core::BookingError;
use carpool_trip::{FareQuote, Place};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Confirmed and completed bookings hold a seat
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "completed" => Ok(BookingStatus::Completed),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

/// Set by the payment collaborator; never changed by the booking core
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// A passenger's reservation of one seat, possibly for part of the route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub distance_km: f64,
    pub partial_distance_factor: f64,
    pub passenger_cost: f64,
    pub driver_contribution: f64,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn confirmed(
        trip_id: Uuid,
        passenger_id: Uuid,
        pickup: Place,
        dropoff: Place,
        distance_km: f64,
        quote: &FareQuote,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id,
            passenger_id,
            pickup,
            dropoff,
            distance_km,
            partial_distance_factor: quote.partial_distance_factor,
            passenger_cost: quote.passenger_cost,
            driver_contribution: quote.driver_contribution,
            payment_status: PaymentStatus::Pending,
            booking_status: BookingStatus::Confirmed,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.booking_status.is_active()
    }

    pub fn cancel(&mut self, reason: Option<String>, cancelled_by: Uuid) {
        let now = Utc::now();
        self.booking_status = BookingStatus::Cancelled;
        self.cancellation_reason = reason;
        self.cancelled_by = Some(cancelled_by);
        self.cancelled_at = Some(now);
        self.updated_at = now;
    }

    pub fn pricing(&self) -> PricingBreakdown {
        PricingBreakdown {
            passenger_cost: self.passenger_cost,
            driver_contribution: self.driver_contribution,
            partial_distance_factor: self.partial_distance_factor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub trip_id: Uuid,
    pub pickup_address: String,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub dropoff_address: String,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
}

impl CreateBookingRequest {
    pub fn pickup(&self) -> Place {
        Place::new(self.pickup_address.trim(), self.pickup_latitude, self.pickup_longitude)
    }

    pub fn dropoff(&self) -> Place {
        Place::new(self.dropoff_address.trim(), self.dropoff_latitude, self.dropoff_longitude)
    }

    pub fn validate(&self) -> Result<(), BookingError> {
        if self.trip_id.is_nil() {
            return Err(BookingError::Validation("trip_id is required".into()));
        }
        self.pickup().validate("pickup")?;
        self.dropoff().validate("dropoff")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelBookingRequest {
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub passenger_cost: f64,
    pub driver_contribution: f64,
    pub partial_distance_factor: f64,
}

/// Result of a committed booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub pricing: PricingBreakdown,
}

#[derive(Debug, Clone)]
pub enum CancellationOutcome {
    Cancelled(Booking),
    AlreadyCancelled(Booking),
}

impl CancellationOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            CancellationOutcome::Cancelled(b) | CancellationOutcome::AlreadyCancelled(b) => b,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            CancellationOutcome::Cancelled(_) => "Booking cancelled successfully",
            CancellationOutcome::AlreadyCancelled(_) => "Booking is already cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateBookingRequest {
        CreateBookingRequest {
            trip_id: Uuid::new_v4(),
            pickup_address: "  MG Road ".into(),
            pickup_latitude: 12.9756,
            pickup_longitude: 77.6050,
            dropoff_address: "Hebbal".into(),
            dropoff_latitude: 13.0358,
            dropoff_longitude: 77.5970,
        }
    }

    #[test]
    fn test_request_validation() {
        assert!(request().validate().is_ok());
        assert_eq!(request().pickup().address, "MG Road");

        let mut req = request();
        req.dropoff_address = "   ".into();
        assert!(matches!(req.validate(), Err(BookingError::Validation(_))));

        let mut req = request();
        req.pickup_longitude = 181.0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.trip_id = Uuid::nil();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_cancel_records_audit_fields() {
        let quote = FareQuote {
            total_trip_cost: 500.0,
            driver_share_factor: 0.5,
            passenger_cost: 250.0,
            driver_contribution: 250.0,
            partial_distance_factor: 1.0,
        };
        let req = request();
        let mut booking = Booking::confirmed(req.trip_id, Uuid::new_v4(), req.pickup(), req.dropoff(), 20.0, &quote);
        assert!(booking.is_active());
        assert_eq!(booking.payment_status, PaymentStatus::Pending);

        let actor = Uuid::new_v4();
        booking.cancel(Some("plans changed".into()), actor);

        assert!(!booking.is_active());
        assert_eq!(booking.cancelled_by, Some(actor));
        assert!(booking.cancelled_at.is_some());
        assert_eq!(booking.cancellation_reason.as_deref(), Some("plans changed"));
    }
}

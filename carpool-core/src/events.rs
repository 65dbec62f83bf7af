use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published after a booking transaction commits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    Confirmed {
        booking_id: Uuid,
        trip_id: Uuid,
        passenger_id: Uuid,
        passenger_cost: f64,
        available_seats: i32,
        occurred_at: i64,
    },
    Cancelled {
        booking_id: Uuid,
        trip_id: Uuid,
        cancelled_by: Uuid,
        available_seats: i32,
        occurred_at: i64,
    },
}

impl BookingEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEvent::Confirmed { .. } => "booking.confirmed",
            BookingEvent::Cancelled { .. } => "booking.cancelled",
        }
    }

    /// Partition key; events of one trip stay ordered
    pub fn key(&self) -> String {
        match self {
            BookingEvent::Confirmed { trip_id, .. } | BookingEvent::Cancelled { trip_id, .. } => {
                trip_id.to_string()
            }
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        event: &BookingEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Drops every event; used when no broker is configured
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(
        &self,
        event: &BookingEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::debug!(topic = event.topic(), "No event broker configured, dropping event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let trip_id = Uuid::new_v4();
        let event = BookingEvent::Cancelled {
            booking_id: Uuid::new_v4(),
            trip_id,
            cancelled_by: Uuid::new_v4(),
            available_seats: 2,
            occurred_at: 1_700_000_000,
        };

        let json = serde_json::to_value(&event).expect("Failed to serialize");
        assert_eq!(json["type"], "cancelled");
        assert_eq!(json["available_seats"], 2);
        assert_eq!(event.topic(), "booking.cancelled");
        assert_eq!(event.key(), trip_id.to_string());
    }
}

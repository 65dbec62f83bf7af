use carpool_core::{BookingError, Coordinates};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Upper bound on seats a driver may offer on one trip
pub const MAX_SEATS_PER_TRIP: i32 = 3;

/// Trip status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Scheduled => "scheduled",
            TripStatus::Cancelled => "cancelled",
            TripStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TripStatus::Scheduled),
            "cancelled" => Ok(TripStatus::Cancelled),
            "completed" => Ok(TripStatus::Completed),
            other => Err(format!("unknown trip status '{}'", other)),
        }
    }
}

/// An addressed point on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Place {
    pub fn new(address: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            address: address.into(),
            latitude,
            longitude,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    pub fn validate(&self, label: &str) -> Result<(), BookingError> {
        if self.address.trim().is_empty() {
            return Err(BookingError::Validation(format!("{} address is required", label)));
        }
        self.coordinates().validate(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub order: i32,
}

impl Waypoint {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A driver-published scheduled ride with a fixed route and seat capacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub schedule_date: NaiveDate,
    pub schedule_time: NaiveTime,
    pub origin: Place,
    pub destination: Place,
    pub waypoints: Vec<Waypoint>,
    pub total_distance_km: f64,
    pub max_seats: i32,
    pub available_seats: i32,
    pub base_trip_cost: f64,
    pub fuel_rate_per_km: f64,
    pub vehicle_factor: f64,
    pub status: TripStatus,
    pub is_women_only: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Build a scheduled trip with every seat available
    pub fn publish(
        driver_id: Uuid,
        draft: TripDraft,
        total_distance_km: f64,
        fuel_rate_per_km: f64,
        vehicle_factor: f64,
    ) -> Self {
        let now = Utc::now();
        let mut waypoints = draft.waypoints;
        waypoints.sort_by_key(|w| w.order);

        Self {
            id: Uuid::new_v4(),
            driver_id,
            vehicle_id: draft.vehicle_id,
            schedule_date: draft.schedule_date,
            schedule_time: draft.schedule_time,
            origin: draft.origin,
            destination: draft.destination,
            waypoints,
            total_distance_km,
            max_seats: draft.max_seats,
            available_seats: draft.max_seats,
            base_trip_cost: carpool_core::round2(total_distance_km * fuel_rate_per_km * vehicle_factor),
            fuel_rate_per_km,
            vehicle_factor,
            status: TripStatus::Scheduled,
            is_women_only: draft.is_women_only,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.status == TripStatus::Scheduled
    }

    pub fn is_driven_by(&self, user_id: Uuid) -> bool {
        self.driver_id == user_id
    }

    pub fn update_status(&mut self, status: TripStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Driver input for publishing a trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripDraft {
    pub vehicle_id: Uuid,
    pub schedule_date: NaiveDate,
    pub schedule_time: NaiveTime,
    pub origin: Place,
    pub destination: Place,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
    pub max_seats: i32,
    pub vehicle_type: String,
    pub fuel_rate_per_km: Option<f64>,
    #[serde(default)]
    pub is_women_only: bool,
}

impl TripDraft {
    pub fn validate(&self) -> Result<(), BookingError> {
        if !(1..=MAX_SEATS_PER_TRIP).contains(&self.max_seats) {
            return Err(BookingError::Validation(format!(
                "max_seats must be between 1 and {}",
                MAX_SEATS_PER_TRIP
            )));
        }
        self.origin.validate("origin")?;
        self.destination.validate("destination")?;

        for waypoint in &self.waypoints {
            if waypoint.address.trim().is_empty() {
                return Err(BookingError::Validation("waypoint address is required".into()));
            }
            waypoint.coordinates().validate("waypoint")?;
        }

        let mut orders: Vec<i32> = self.waypoints.iter().map(|w| w.order).collect();
        orders.sort_unstable();
        orders.dedup();
        if orders.len() != self.waypoints.len() {
            return Err(BookingError::Validation("waypoint order values must be unique".into()));
        }

        if let Some(rate) = self.fuel_rate_per_km {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(BookingError::Validation("fuel_rate_per_km must be positive".into()));
            }
        }
        Ok(())
    }

    /// Origin, waypoints by `order`, destination
    pub fn route_points(&self) -> Vec<Coordinates> {
        let mut waypoints: Vec<&Waypoint> = self.waypoints.iter().collect();
        waypoints.sort_by_key(|w| w.order);

        let mut points = Vec::with_capacity(waypoints.len() + 2);
        points.push(self.origin.coordinates());
        points.extend(waypoints.iter().map(|w| w.coordinates()));
        points.push(self.destination.coordinates());
        points
    }
}

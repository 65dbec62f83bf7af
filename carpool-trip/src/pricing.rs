use carpool_core::round2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::trip::MAX_SEATS_PER_TRIP;

/// How the driver's share of the base cost shrinks as riders join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverShareScaling {
    /// `single_passenger_factor / passenger_count`
    #[default]
    Linear,
    /// `single_passenger_factor` regardless of rider count
    Constant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareConfig {
    /// Share of the base cost the driver bears with a single rider
    #[serde(default = "default_driver_share")]
    pub driver_share_factor_single_passenger: f64,

    #[serde(default)]
    pub driver_share_scaling: DriverShareScaling,

    /// Floor for the partial distance factor; keeps a minimum fare on short segments
    #[serde(default = "default_min_partial_factor")]
    pub min_partial_factor: f64,

    /// Used when the driver does not state a fuel rate
    #[serde(default = "default_fuel_rate")]
    pub default_fuel_rate_per_km: f64,

    /// Multipliers per vehicle type (e.g., "suv" => 1.5)
    #[serde(default = "default_vehicle_factors")]
    pub vehicle_factors: HashMap<String, f64>,
}

fn default_driver_share() -> f64 { 0.5 }
fn default_min_partial_factor() -> f64 { 0.1 }
fn default_fuel_rate() -> f64 { 7.5 }

fn default_vehicle_factors() -> HashMap<String, f64> {
    let mut m = HashMap::new();
    m.insert("hatchback".to_string(), 1.0);
    m.insert("sedan".to_string(), 1.2);
    m.insert("muv".to_string(), 1.4);
    m.insert("suv".to_string(), 1.5);
    m
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            driver_share_factor_single_passenger: default_driver_share(),
            driver_share_scaling: DriverShareScaling::default(),
            min_partial_factor: default_min_partial_factor(),
            default_fuel_rate_per_km: default_fuel_rate(),
            vehicle_factors: default_vehicle_factors(),
        }
    }
}

impl FareConfig {
    pub fn vehicle_factor(&self, vehicle_type: &str) -> Option<f64> {
        self.vehicle_factors
            .get(&vehicle_type.to_ascii_lowercase())
            .copied()
    }

    pub fn validate(&self) -> Result<(), FareError> {
        if !(0.0..1.0).contains(&self.driver_share_factor_single_passenger) {
            return Err(FareError::InvalidConfig(
                "driver_share_factor_single_passenger must be in [0, 1)".into(),
            ));
        }
        if !(self.min_partial_factor > 0.0 && self.min_partial_factor <= 1.0) {
            return Err(FareError::InvalidConfig("min_partial_factor must be in (0, 1]".into()));
        }
        if self.default_fuel_rate_per_km <= 0.0 {
            return Err(FareError::InvalidConfig("default_fuel_rate_per_km must be positive".into()));
        }
        if let Some((name, _)) = self.vehicle_factors.iter().find(|(_, f)| **f <= 0.0) {
            return Err(FareError::InvalidConfig(format!("vehicle factor for '{}' must be positive", name)));
        }
        Ok(())
    }
}

/// Everything the fare engine needs to price one passenger
#[derive(Debug, Clone, Copy)]
pub struct FareInput {
    /// Full trip route, km
    pub distance_km: f64,
    pub fuel_rate_per_km: f64,
    pub vehicle_factor: f64,
    /// Active riders including the one being priced
    pub passenger_count: i32,
    pub partial_distance_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FareQuote {
    pub total_trip_cost: f64,
    pub driver_share_factor: f64,
    pub passenger_cost: f64,
    pub driver_contribution: f64,
    pub partial_distance_factor: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FareError {
    #[error("Invalid fare input: {0}")]
    InvalidInput(String),

    #[error("Invalid fare configuration: {0}")]
    InvalidConfig(String),
}

impl From<FareError> for carpool_core::BookingError {
    fn from(err: FareError) -> Self {
        carpool_core::BookingError::InvalidFareInput(err.to_string())
    }
}

/// Pure cost-splitting between a driver and co-riders
#[derive(Debug, Clone)]
pub struct FareEngine {
    config: FareConfig,
}

impl FareEngine {
    pub fn new(config: FareConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FareConfig {
        &self.config
    }

    pub fn driver_share_factor(&self, passenger_count: i32) -> f64 {
        let single = self.config.driver_share_factor_single_passenger;
        match self.config.driver_share_scaling {
            DriverShareScaling::Linear if passenger_count > 1 => single / passenger_count as f64,
            _ => single,
        }
    }

    /// Passenger segment as a fraction of the full route, clamped to `[min_partial_factor, 1]`.
    /// Returns `None` when the route distance is not positive.
    pub fn partial_distance_factor(&self, passenger_km: f64, route_km: f64) -> Option<f64> {
        if !route_km.is_finite() || route_km <= 0.0 {
            return None;
        }
        let ratio = if passenger_km.is_finite() { passenger_km / route_km } else { 1.0 };
        Some(ratio.clamp(self.config.min_partial_factor, 1.0))
    }

    pub fn quote(&self, input: &FareInput) -> Result<FareQuote, FareError> {
        if !input.distance_km.is_finite() || input.distance_km <= 0.0 {
            return Err(FareError::InvalidInput("distance must be positive".into()));
        }
        if !(1..=MAX_SEATS_PER_TRIP).contains(&input.passenger_count) {
            return Err(FareError::InvalidInput(format!(
                "passenger count must be between 1 and {}",
                MAX_SEATS_PER_TRIP
            )));
        }
        if !input.fuel_rate_per_km.is_finite() || input.fuel_rate_per_km <= 0.0 {
            return Err(FareError::InvalidInput("fuel rate must be positive".into()));
        }
        if !input.vehicle_factor.is_finite() || input.vehicle_factor <= 0.0 {
            return Err(FareError::InvalidInput("vehicle factor must be positive".into()));
        }
        if !input.partial_distance_factor.is_finite() {
            return Err(FareError::InvalidInput("partial distance factor must be a number".into()));
        }

        let partial = input
            .partial_distance_factor
            .clamp(self.config.min_partial_factor, 1.0);
        let count = input.passenger_count as f64;

        let total_trip_cost = input.distance_km * input.fuel_rate_per_km * input.vehicle_factor;
        let driver_share_factor = self.driver_share_factor(input.passenger_count);
        let per_passenger_base_share = total_trip_cost * (1.0 - driver_share_factor) / count;

        let passenger_cost = round2(per_passenger_base_share * partial);
        let driver_contribution = round2(total_trip_cost - passenger_cost * count).max(0.0);

        Ok(FareQuote {
            total_trip_cost: round2(total_trip_cost),
            driver_share_factor,
            passenger_cost,
            driver_contribution,
            partial_distance_factor: partial,
        })
    }
}

impl Default for FareEngine {
    fn default() -> Self {
        Self::new(FareConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(passenger_count: i32, partial_distance_factor: f64) -> FareInput {
        FareInput {
            distance_km: 20.0,
            fuel_rate_per_km: 25.0,
            vehicle_factor: 1.0,
            passenger_count,
            partial_distance_factor,
        }
    }

    #[test]
    fn test_single_passenger_full_route() {
        let engine = FareEngine::default();
        let quote = engine.quote(&input(1, 1.0)).unwrap();

        assert_eq!(quote.total_trip_cost, 500.0);
        assert_eq!(quote.driver_share_factor, 0.5);
        assert_eq!(quote.passenger_cost, 250.0);
        assert_eq!(quote.driver_contribution, 250.0);
    }

    #[test]
    fn test_second_passenger_half_route() {
        let engine = FareEngine::default();
        let quote = engine.quote(&input(2, 0.5)).unwrap();

        assert_eq!(quote.driver_share_factor, 0.25);
        assert_eq!(quote.passenger_cost, 93.75);
        assert_eq!(quote.driver_contribution, 312.5);
    }

    #[test]
    fn test_constant_scaling_keeps_single_factor() {
        let engine = FareEngine::new(FareConfig {
            driver_share_scaling: DriverShareScaling::Constant,
            ..FareConfig::default()
        });
        assert_eq!(engine.driver_share_factor(3), 0.5);

        let quote = engine.quote(&input(2, 1.0)).unwrap();
        assert_eq!(quote.passenger_cost, 125.0);
    }

    #[test]
    fn test_partial_factor_is_clamped() {
        let engine = FareEngine::default();
        assert_eq!(engine.partial_distance_factor(0.5, 20.0), Some(0.1));
        assert_eq!(engine.partial_distance_factor(10.0, 20.0), Some(0.5));
        assert_eq!(engine.partial_distance_factor(35.0, 20.0), Some(1.0));
        assert_eq!(engine.partial_distance_factor(5.0, 0.0), None);

        for km in [0.0, 0.01, 1.0, 7.3, 19.99, 20.0, 400.0] {
            let f = engine.partial_distance_factor(km, 20.0).unwrap();
            assert!((0.1..=1.0).contains(&f));
        }
    }

    #[test]
    fn test_passenger_cost_monotonic_in_partial_factor() {
        let engine = FareEngine::default();
        for count in 1..=3 {
            let mut previous = 0.0;
            for step in 0..=100 {
                let factor = step as f64 / 100.0;
                let quote = engine.quote(&input(count, factor)).unwrap();
                assert!(quote.passenger_cost >= previous);
                assert!(quote.driver_contribution >= 0.0);
                previous = quote.passenger_cost;
            }
        }
    }

    #[test]
    fn test_midpoint_cost_rounds_half_up() {
        let engine = FareEngine::default();
        let quote = engine
            .quote(&FareInput {
                distance_km: 4.02,
                fuel_rate_per_km: 1.0,
                vehicle_factor: 1.0,
                passenger_count: 1,
                partial_distance_factor: 0.5,
            })
            .unwrap();
        assert_eq!(quote.passenger_cost, 1.01);
        assert_eq!(quote.driver_contribution, 3.01);
    }

    #[test]
    fn test_minimum_fare_for_tiny_segment() {
        let engine = FareEngine::default();
        let quote = engine.quote(&input(1, 0.0)).unwrap();
        assert_eq!(quote.partial_distance_factor, 0.1);
        assert_eq!(quote.passenger_cost, 25.0);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let engine = FareEngine::default();

        let mut bad = input(1, 1.0);
        bad.distance_km = 0.0;
        assert!(matches!(engine.quote(&bad), Err(FareError::InvalidInput(_))));

        assert!(engine.quote(&input(0, 1.0)).is_err());
        assert!(engine.quote(&input(4, 1.0)).is_err());

        let mut bad = input(1, 1.0);
        bad.fuel_rate_per_km = -1.0;
        assert!(engine.quote(&bad).is_err());

        let mut bad = input(1, 1.0);
        bad.vehicle_factor = 0.0;
        assert!(engine.quote(&bad).is_err());
    }

    #[test]
    fn test_vehicle_factor_lookup() {
        let config = FareConfig::default();
        assert_eq!(config.vehicle_factor("SUV"), Some(1.5));
        assert_eq!(config.vehicle_factor("rickshaw"), None);
        assert!(config.validate().is_ok());
    }
}

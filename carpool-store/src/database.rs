use carpool_trip::{DriverShareScaling, FareConfig};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay fare settings stored in `business_rules` on top of `defaults`
    pub async fn fetch_fare_rules(&self, defaults: FareConfig) -> Result<FareConfig, sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
                .fetch_all(&self.pool)
                .await?;

        let mut rules = defaults;
        for (key, value) in rows {
            apply_fare_rule(&mut rules, &key, &value);
        }
        Ok(rules)
    }
}

/// Rule values are stored as `{"value": <number|string|object>}`
fn apply_fare_rule(rules: &mut FareConfig, key: &str, value: &Value) {
    let Some(v) = value.get("value") else {
        warn!(rule_key = key, "Business rule without a value field, skipping");
        return;
    };

    match key {
        "driver_share_factor_single_passenger" => {
            if let Some(f) = v.as_f64() {
                rules.driver_share_factor_single_passenger = f;
            }
        }
        "driver_share_scaling" => match v.as_str() {
            Some("linear") => rules.driver_share_scaling = DriverShareScaling::Linear,
            Some("constant") => rules.driver_share_scaling = DriverShareScaling::Constant,
            _ => warn!(rule_key = key, "Unrecognised driver share scaling"),
        },
        "min_partial_factor" => {
            if let Some(f) = v.as_f64() {
                rules.min_partial_factor = f;
            }
        }
        "default_fuel_rate_per_km" => {
            if let Some(f) = v.as_f64() {
                rules.default_fuel_rate_per_km = f;
            }
        }
        "vehicle_factors" => {
            if let Some(map) = v.as_object() {
                for (vehicle, factor) in map {
                    if let Some(f) = factor.as_f64() {
                        rules.vehicle_factors.insert(vehicle.to_ascii_lowercase(), f);
                    }
                }
            }
        }
        _ => {}
    }
}

use carpool_trip::FareConfig;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub fare: FareConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Without a URL the service runs on the in-memory store
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: i64,
}

fn default_requests_per_minute() -> i64 { 120 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    /// Base URL of an OSRM-compatible routing service
    pub url: Option<String>,
    #[serde(default = "default_routing_timeout_ms")]
    pub timeout_ms: u64,
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_routing_timeout_ms(),
        }
    }
}

fn default_routing_timeout_ms() -> u64 { 2000 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `CARPOOL__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("CARPOOL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

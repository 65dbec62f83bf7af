pub mod app_config;
pub mod database;
pub mod events;
pub mod pg_store;
pub mod redis_repo;
pub mod routing;

pub use app_config::Config;
pub use database::DbClient;
pub use events::EventProducer;
pub use pg_store::PgStore;
pub use redis_repo::RedisClient;
pub use routing::OsrmResolver;

use anyhow::Context;
use carpool_api::{app, AppState, AuthConfig};
use carpool_booking::{BookingManager, Database, MemoryStore, TripService};
use carpool_core::{EventPublisher, FallbackResolver, NoopPublisher};
use carpool_store::{Config, DbClient, EventProducer, OsrmResolver, PgStore, RedisClient};
use carpool_trip::FareEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carpool_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting carpool API on port {}", config.server.port);

    // Storage
    let (db, mut fare) = match &config.database.url {
        Some(url) => {
            let client = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            client.migrate().await.context("Failed to run migrations")?;
            let fare = client
                .fetch_fare_rules(config.fare.clone())
                .await
                .context("Failed to load business rules")?;
            (Arc::new(PgStore::new(client.pool.clone())) as Arc<dyn Database>, fare)
        }
        None => {
            tracing::warn!("No database configured, using the in-memory store");
            (Arc::new(MemoryStore::new()) as Arc<dyn Database>, config.fare.clone())
        }
    };
    if let Err(e) = fare.validate() {
        tracing::warn!(error = %e, "Fare rules rejected, falling back to configured values");
        fare = config.fare.clone();
        fare.validate().context("Invalid fare configuration")?;
    }

    // Distance resolution
    let distance = match &config.routing.url {
        Some(url) => {
            let osrm = OsrmResolver::new(url.as_str(), config.routing.timeout())
                .context("Failed to build routing client")?;
            FallbackResolver::new(Arc::new(osrm), config.routing.timeout())
        }
        None => FallbackResolver::geodesic_only(),
    };

    // Kafka
    let events: Arc<dyn EventPublisher> = match &config.kafka {
        Some(kafka) => {
            let producer =
                EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
            Arc::new(producer)
        }
        None => Arc::new(NoopPublisher),
    };

    // Redis
    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url, redis.requests_per_minute)
                .context("Failed to create Redis client")?,
        )),
        None => None,
    };

    let app_state = AppState {
        trips: Arc::new(TripService::new(db.clone(), distance.clone(), fare.clone())),
        bookings: Arc::new(BookingManager::new(db, distance, FareEngine::new(fare), events)),
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

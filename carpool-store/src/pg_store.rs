use async_trait::async_trait;
use carpool_booking::{Booking, BookingStatus, Database, PaymentStatus, StoreError, StoreResult, UnitOfWork};
use carpool_trip::{Place, Trip, TripStatus, Waypoint};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const TRIP_COLUMNS: &str = r#"
    id, driver_id, vehicle_id, schedule_date, schedule_time,
    origin_address, origin_latitude, origin_longitude,
    destination_address, destination_latitude, destination_longitude,
    waypoints, total_distance_km, max_seats, available_seats,
    base_trip_cost, fuel_rate_per_km, vehicle_factor, status, is_women_only,
    created_at, updated_at
"#;

const BOOKING_COLUMNS: &str = r#"
    id, trip_id, passenger_id,
    pickup_address, pickup_latitude, pickup_longitude,
    dropoff_address, dropoff_latitude, dropoff_longitude,
    distance_km, partial_distance_factor, passenger_cost, driver_contribution,
    payment_status, booking_status, cancellation_reason, cancelled_by, cancelled_at,
    created_at, updated_at
"#;

/// Unique violations surface as `Conflict` so callers can tell a lost race from an outage
fn db_err(err: sqlx::Error) -> StoreError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    driver_id: Uuid,
    vehicle_id: Uuid,
    schedule_date: NaiveDate,
    schedule_time: NaiveTime,
    origin_address: String,
    origin_latitude: f64,
    origin_longitude: f64,
    destination_address: String,
    destination_latitude: f64,
    destination_longitude: f64,
    waypoints: Json<Vec<Waypoint>>,
    total_distance_km: f64,
    max_seats: i32,
    available_seats: i32,
    base_trip_cost: f64,
    fuel_rate_per_km: f64,
    vehicle_factor: f64,
    status: String,
    is_women_only: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let status: TripStatus = row.status.parse().map_err(StoreError::Backend)?;
        Ok(Trip {
            id: row.id,
            driver_id: row.driver_id,
            vehicle_id: row.vehicle_id,
            schedule_date: row.schedule_date,
            schedule_time: row.schedule_time,
            origin: Place::new(row.origin_address, row.origin_latitude, row.origin_longitude),
            destination: Place::new(
                row.destination_address,
                row.destination_latitude,
                row.destination_longitude,
            ),
            waypoints: row.waypoints.0,
            total_distance_km: row.total_distance_km,
            max_seats: row.max_seats,
            available_seats: row.available_seats,
            base_trip_cost: row.base_trip_cost,
            fuel_rate_per_km: row.fuel_rate_per_km,
            vehicle_factor: row.vehicle_factor,
            status,
            is_women_only: row.is_women_only,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    trip_id: Uuid,
    passenger_id: Uuid,
    pickup_address: String,
    pickup_latitude: f64,
    pickup_longitude: f64,
    dropoff_address: String,
    dropoff_latitude: f64,
    dropoff_longitude: f64,
    distance_km: f64,
    partial_distance_factor: f64,
    passenger_cost: f64,
    driver_contribution: f64,
    payment_status: String,
    booking_status: String,
    cancellation_reason: Option<String>,
    cancelled_by: Option<Uuid>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let payment_status: PaymentStatus =
            row.payment_status.parse().map_err(StoreError::Backend)?;
        let booking_status: BookingStatus =
            row.booking_status.parse().map_err(StoreError::Backend)?;
        Ok(Booking {
            id: row.id,
            trip_id: row.trip_id,
            passenger_id: row.passenger_id,
            pickup: Place::new(row.pickup_address, row.pickup_latitude, row.pickup_longitude),
            dropoff: Place::new(row.dropoff_address, row.dropoff_latitude, row.dropoff_longitude),
            distance_km: row.distance_km,
            partial_distance_factor: row.partial_distance_factor,
            passenger_cost: row.passenger_cost,
            driver_contribution: row.driver_contribution,
            payment_status,
            booking_status,
            cancellation_reason: row.cancellation_reason,
            cancelled_by: row.cancelled_by,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_trip(row: Option<TripRow>) -> StoreResult<Option<Trip>> {
    row.map(Trip::try_from).transpose()
}

fn into_booking(row: Option<BookingRow>) -> StoreResult<Option<Booking>> {
    row.map(Booking::try_from).transpose()
}

fn into_bookings(rows: Vec<BookingRow>) -> StoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

/// PostgreSQL-backed store. Row locks are `SELECT ... FOR UPDATE` inside a transaction.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_trip(&mut self, trip_id: Uuid) -> StoreResult<Option<Trip>> {
        let sql = format!("SELECT {} FROM trips WHERE id = $1 FOR UPDATE", TRIP_COLUMNS);
        let row: Option<TripRow> = sqlx::query_as(&sql)
            .bind(trip_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        into_trip(row)
    }

    async fn lock_booking(&mut self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1 FOR UPDATE", BOOKING_COLUMNS);
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        into_booking(row)
    }

    async fn save_trip_seats(&mut self, trip: &Trip) -> StoreResult<()> {
        sqlx::query("UPDATE trips SET available_seats = $2, updated_at = $3 WHERE id = $1")
            .bind(trip.id)
            .bind(trip.available_seats)
            .bind(trip.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn save_trip_status(&mut self, trip: &Trip) -> StoreResult<()> {
        sqlx::query("UPDATE trips SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(trip.id)
            .bind(trip.status.as_str())
            .bind(trip.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO bookings ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
            BOOKING_COLUMNS
        );
        sqlx::query(&sql)
            .bind(booking.id)
            .bind(booking.trip_id)
            .bind(booking.passenger_id)
            .bind(&booking.pickup.address)
            .bind(booking.pickup.latitude)
            .bind(booking.pickup.longitude)
            .bind(&booking.dropoff.address)
            .bind(booking.dropoff.latitude)
            .bind(booking.dropoff.longitude)
            .bind(booking.distance_km)
            .bind(booking.partial_distance_factor)
            .bind(booking.passenger_cost)
            .bind(booking.driver_contribution)
            .bind(booking.payment_status.as_str())
            .bind(booking.booking_status.as_str())
            .bind(&booking.cancellation_reason)
            .bind(booking.cancelled_by)
            .bind(booking.cancelled_at)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn save_booking_status(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET booking_status = $2, cancellation_reason = $3, cancelled_by = $4,
                cancelled_at = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(booking.booking_status.as_str())
        .bind(&booking.cancellation_reason)
        .bind(booking.cancelled_by)
        .bind(booking.cancelled_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let uow = *self;
        uow.tx.commit().await.map_err(db_err)
    }
}

#[async_trait]
impl Database for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO trips ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)",
            TRIP_COLUMNS
        );
        sqlx::query(&sql)
            .bind(trip.id)
            .bind(trip.driver_id)
            .bind(trip.vehicle_id)
            .bind(trip.schedule_date)
            .bind(trip.schedule_time)
            .bind(&trip.origin.address)
            .bind(trip.origin.latitude)
            .bind(trip.origin.longitude)
            .bind(&trip.destination.address)
            .bind(trip.destination.latitude)
            .bind(trip.destination.longitude)
            .bind(Json(&trip.waypoints))
            .bind(trip.total_distance_km)
            .bind(trip.max_seats)
            .bind(trip.available_seats)
            .bind(trip.base_trip_cost)
            .bind(trip.fuel_rate_per_km)
            .bind(trip.vehicle_factor)
            .bind(trip.status.as_str())
            .bind(trip.is_women_only)
            .bind(trip.created_at)
            .bind(trip.updated_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find_trip(&self, trip_id: Uuid) -> StoreResult<Option<Trip>> {
        let sql = format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS);
        let row: Option<TripRow> = sqlx::query_as(&sql)
            .bind(trip_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        into_trip(row)
    }

    async fn find_booking(&self, booking_id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        into_booking(row)
    }

    async fn find_active_booking(
        &self,
        trip_id: Uuid,
        passenger_id: Uuid,
    ) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings \
             WHERE trip_id = $1 AND passenger_id = $2 \
             AND booking_status IN ('confirmed', 'completed') \
             LIMIT 1",
            BOOKING_COLUMNS
        );
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(trip_id)
            .bind(passenger_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        into_booking(row)
    }

    async fn count_active_bookings(&self, trip_id: Uuid) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings \
             WHERE trip_id = $1 AND booking_status IN ('confirmed', 'completed')",
        )
        .bind(trip_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count)
    }

    async fn list_trip_bookings(&self, trip_id: Uuid) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE trip_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        into_bookings(rows)
    }

    async fn list_passenger_bookings(&self, passenger_id: Uuid) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE passenger_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(passenger_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        into_bookings(rows)
    }
}

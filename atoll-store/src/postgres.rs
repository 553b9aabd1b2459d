use async_trait::async_trait;
use atoll_core::{BookingStore, PackageStore, PaymentStore, ReserveOutcome, StoreError};
use atoll_domain::{
    Booking, BookingStatus, BookingTarget, Package, Payment, PaymentState, PaymentStatus,
    TravelerDetail,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn corrupt(msg: String) -> StoreError {
    StoreError::Backend(msg)
}

// ============================================================================
// Packages
// ============================================================================

pub struct PgPackageStore {
    pool: PgPool,
}

impl PgPackageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PackageRow {
    id: Uuid,
    name: String,
    capacity: i32,
    booked: i32,
    price: i64,
    departure_dates: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PackageRow {
    fn into_domain(self) -> Result<Package, StoreError> {
        let departure_dates: Vec<NaiveDate> = serde_json::from_str(&self.departure_dates)
            .map_err(|e| corrupt(format!("package {} departure_dates: {}", self.id, e)))?;
        Ok(Package {
            id: self.id,
            name: self.name,
            capacity: self.capacity,
            booked: self.booked,
            price: self.price,
            departure_dates,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl PackageStore for PgPackageStore {
    async fn upsert_package(&self, package: &Package) -> Result<(), StoreError> {
        let departure_dates = serde_json::to_string(&package.departure_dates)
            .map_err(|e| corrupt(e.to_string()))?;

        // booked is deliberately absent from the conflict update: only the
        // ledger's conditional update may move that counter.
        sqlx::query(
            r#"
            INSERT INTO packages (id, name, capacity, booked, price, departure_dates, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                capacity = EXCLUDED.capacity,
                price = EXCLUDED.price,
                departure_dates = EXCLUDED.departure_dates,
                updated_at = NOW()
            "#,
        )
        .bind(package.id)
        .bind(&package.name)
        .bind(package.capacity)
        .bind(package.booked)
        .bind(package.price)
        .bind(&departure_dates)
        .bind(package.created_at)
        .bind(package.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn get_package(&self, id: Uuid) -> Result<Option<Package>, StoreError> {
        let row = sqlx::query_as::<_, PackageRow>(
            "SELECT id, name, capacity, booked, price, departure_dates, created_at, updated_at FROM packages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(PackageRow::into_domain).transpose()
    }

    async fn list_packages(&self) -> Result<Vec<Package>, StoreError> {
        let rows = sqlx::query_as::<_, PackageRow>(
            "SELECT id, name, capacity, booked, price, departure_dates, created_at, updated_at FROM packages ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(PackageRow::into_domain).collect()
    }

    async fn try_reserve(&self, id: Uuid, count: u32) -> Result<ReserveOutcome, StoreError> {
        // Single conditional statement: the check and the increment commit
        // together or not at all, so concurrent reserves cannot both pass a
        // stale check and jointly overbook.
        let result = sqlx::query(
            "UPDATE packages SET booked = booked + $2, updated_at = NOW() WHERE id = $1 AND booked + $2 <= capacity",
        )
        .bind(id)
        .bind(count as i32)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(ReserveOutcome::Reserved);
        }

        let counters =
            sqlx::query_as::<_, (i32, i32)>("SELECT capacity, booked FROM packages WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        match counters {
            Some((capacity, booked)) => Ok(ReserveOutcome::Insufficient {
                available: (capacity - booked).max(0),
            }),
            None => Ok(ReserveOutcome::NotFound),
        }
    }

    async fn release(&self, id: Uuid, count: u32) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE packages SET booked = GREATEST(booked - $2, 0), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(count as i32)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }
}

// ============================================================================
// Bookings
// ============================================================================

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    target_kind: String,
    target_id: Uuid,
    user_id: Uuid,
    traveler_count: i32,
    traveler_details: String,
    special_requests: Option<String>,
    status: String,
    payment_status: String,
    total_price: i64,
    departure_date: Option<NaiveDate>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_domain(self) -> Result<Booking, StoreError> {
        let target = BookingTarget::from_parts(&self.target_kind, self.target_id)
            .map_err(|e| corrupt(format!("booking {}: {}", self.id, e)))?;
        let traveler_details: Vec<TravelerDetail> = serde_json::from_str(&self.traveler_details)
            .map_err(|e| corrupt(format!("booking {} traveler_details: {}", self.id, e)))?;
        let status = BookingStatus::from_str(&self.status)
            .map_err(|e| corrupt(format!("booking {}: {}", self.id, e)))?;
        let payment_status = PaymentState::from_str(&self.payment_status)
            .map_err(|e| corrupt(format!("booking {}: {}", self.id, e)))?;

        Ok(Booking {
            id: self.id,
            target,
            user_id: self.user_id,
            traveler_count: self.traveler_count.max(0) as u32,
            traveler_details,
            special_requests: self.special_requests,
            status,
            payment_status,
            total_price: self.total_price,
            departure_date: self.departure_date,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_BOOKING: &str = "SELECT id, target_kind, target_id, user_id, traveler_count, traveler_details, special_requests, status, payment_status, total_price, departure_date, version, created_at, updated_at FROM bookings";

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let traveler_details = serde_json::to_string(&booking.traveler_details)
            .map_err(|e| corrupt(e.to_string()))?;

        // ON CONFLICT DO NOTHING keys retries by booking id: a timed-out
        // write resubmitted by the coordinator cannot double-apply.
        sqlx::query(
            r#"
            INSERT INTO bookings (id, target_kind, target_id, user_id, traveler_count, traveler_details, special_requests, status, payment_status, total_price, departure_date, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(booking.id)
        .bind(booking.target.kind())
        .bind(booking.target.id())
        .bind(booking.user_id)
        .bind(booking.traveler_count as i32)
        .bind(&traveler_details)
        .bind(&booking.special_requests)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.total_price)
        .bind(booking.departure_date)
        .bind(booking.version)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE id = $1", SELECT_BOOKING))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(BookingRow::into_domain).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment_status: PaymentState,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, payment_status = $3, version = version + 1, updated_at = NOW() WHERE id = $1 AND version = $4",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(payment_status.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query_as::<_, (i64,)>("SELECT version FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match exists {
            Some(_) => Err(StoreError::VersionConflict {
                entity: "booking",
                id,
            }),
            None => Err(StoreError::NotFound(format!("booking {}", id))),
        }
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!("{} ORDER BY created_at", SELECT_BOOKING))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter().map(BookingRow::into_domain).collect()
    }

    async fn list_bookings_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at",
            SELECT_BOOKING
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(BookingRow::into_domain).collect()
    }
}

// ============================================================================
// Payments
// ============================================================================

pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    amount: i64,
    method: String,
    status: String,
    transaction_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> Result<Payment, StoreError> {
        let method = atoll_domain::PaymentMethod::from_str(&self.method)
            .map_err(|e| corrupt(format!("payment {}: {}", self.id, e)))?;
        let status = PaymentStatus::from_str(&self.status)
            .map_err(|e| corrupt(format!("payment {}: {}", self.id, e)))?;

        Ok(Payment {
            id: self.id,
            booking_id: self.booking_id,
            amount: self.amount,
            method,
            status,
            transaction_id: self.transaction_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_PAYMENT: &str = "SELECT id, booking_id, amount, method, status, transaction_id, created_at, updated_at FROM payments";

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, amount, method, status, transaction_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.amount)
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn active_payment(&self, booking_id: Uuid) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "{} WHERE booking_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_PAYMENT
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        transaction_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, transaction_id = COALESCE($3, transaction_id), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("payment {}", id)));
        }
        Ok(())
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, StoreError> {
        let rows =
            sqlx::query_as::<_, PaymentRow>(&format!("{} ORDER BY created_at", SELECT_PAYMENT))
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;

        rows.into_iter().map(PaymentRow::into_domain).collect()
    }
}

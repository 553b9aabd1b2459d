#![allow(dead_code)]

use async_trait::async_trait;
use atoll_booking::{AdminAggregator, CapacityLedger, PaymentCoupler, ReservationCoordinator};
use atoll_core::{
    BookingPolicy, BookingStore, PackageStore, PaymentStore, RequestIdentity, StoreError,
};
use atoll_domain::{Booking, BookingStatus, Package, PaymentState, TravelerDetail};
use atoll_store::MemoryStore;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub coordinator: ReservationCoordinator,
    pub coupler: PaymentCoupler,
    pub aggregator: AdminAggregator,
}

pub fn app() -> TestApp {
    app_with_policy(BookingPolicy::default())
}

pub fn app_with_policy(policy: BookingPolicy) -> TestApp {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let packages: Arc<dyn PackageStore> = store.clone();
    let bookings: Arc<dyn BookingStore> = store.clone();
    let payments: Arc<dyn PaymentStore> = store.clone();

    let coordinator = ReservationCoordinator::new(
        packages.clone(),
        bookings.clone(),
        payments.clone(),
        policy.clone(),
    );
    let coupler = PaymentCoupler::new(
        bookings.clone(),
        payments.clone(),
        CapacityLedger::new(packages.clone()),
        policy,
    );
    let aggregator = AdminAggregator::new(bookings, payments, packages, 5);

    TestApp {
        store,
        coordinator,
        coupler,
        aggregator,
    }
}

static TRACING: std::sync::Once = std::sync::Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn identity() -> RequestIdentity {
    RequestIdentity::new(Uuid::new_v4())
}

pub async fn seed_package(store: &MemoryStore, name: &str, capacity: i32, price: i64) -> Uuid {
    seed_package_with_dates(store, name, capacity, price, vec![]).await
}

pub async fn seed_package_with_dates(
    store: &MemoryStore,
    name: &str,
    capacity: i32,
    price: i64,
    departure_dates: Vec<NaiveDate>,
) -> Uuid {
    let package = Package::new(name.to_string(), capacity, price, departure_dates);
    let id = package.id;
    store.upsert_package(&package).await.unwrap();
    id
}

pub fn traveler(name: &str) -> TravelerDetail {
    TravelerDetail {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        phone: "010-1234-5678".to_string(),
        passport_number: "M1234567".to_string(),
        birth_date: "1990-04-01".to_string(),
        gender: "female".to_string(),
    }
}

pub fn travelers(count: usize) -> Vec<TravelerDetail> {
    (0..count).map(|i| traveler(&format!("Traveler {}", i))).collect()
}

pub async fn booked_count(store: &MemoryStore, package_id: Uuid) -> i32 {
    store
        .get_package(package_id)
        .await
        .unwrap()
        .unwrap()
        .booked
}

pub async fn booking_state(store: &MemoryStore, booking_id: Uuid) -> (BookingStatus, PaymentState) {
    let booking = store.get_booking(booking_id).await.unwrap().unwrap();
    (booking.status, booking.payment_status)
}

/// Booking store wrapper that fails inserts on demand, for exercising the
/// coordinator's compensation path.
pub struct FailingBookingStore {
    inner: Arc<MemoryStore>,
    fail_inserts: AtomicBool,
}

impl FailingBookingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
        }
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }
}

/// Booking store wrapper that sneaks a competing Pending -> Confirmed write
/// in front of the first status update it sees, so the wrapped write lands on
/// a stale version.
pub struct RacingBookingStore {
    inner: Arc<MemoryStore>,
    raced: AtomicBool,
}

impl RacingBookingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            raced: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl BookingStore for RacingBookingStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.inner.insert_booking(booking).await
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        self.inner.get_booking(id).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment_status: PaymentState,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner
                .update_status(id, BookingStatus::Confirmed, payment_status, expected_version)
                .await?;
        }
        self.inner
            .update_status(id, status, payment_status, expected_version)
            .await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        self.inner.list_bookings().await
    }

    async fn list_bookings_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        self.inner.list_bookings_by_user(user_id).await
    }
}

#[async_trait]
impl BookingStore for FailingBookingStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected insert failure".to_string()));
        }
        self.inner.insert_booking(booking).await
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        self.inner.get_booking(id).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment_status: PaymentState,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        self.inner
            .update_status(id, status, payment_status, expected_version)
            .await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        self.inner.list_bookings().await
    }

    async fn list_bookings_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        self.inner.list_bookings_by_user(user_id).await
    }
}

use crate::error::StoreError;
use async_trait::async_trait;
use atoll_domain::{Booking, BookingStatus, Package, Payment, PaymentState, PaymentStatus};
use uuid::Uuid;

/// Result of the atomic check-and-increment on a package's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    Insufficient { available: i32 },
    NotFound,
}

/// Access to package rows and their (capacity, booked) pair.
///
/// `try_reserve` must be a single atomic conditional update with respect to
/// concurrent reserve/release calls on the same package id; a read followed
/// by a separate write admits a lost-update race that overbooks.
#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn upsert_package(&self, package: &Package) -> Result<(), StoreError>;

    async fn get_package(&self, id: Uuid) -> Result<Option<Package>, StoreError>;

    async fn list_packages(&self) -> Result<Vec<Package>, StoreError>;

    /// Commit `booked += count` only if `booked + count <= capacity`.
    async fn try_reserve(&self, id: Uuid, count: u32) -> Result<ReserveOutcome, StoreError>;

    /// Decrement `booked` by `count`, clamped at a floor of 0.
    async fn release(&self, id: Uuid, count: u32) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert keyed by the booking id; retrying the same booking is a no-op
    /// so a timed-out write can be resubmitted without double-applying.
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Version-guarded status write. Fails with `VersionConflict` when the
    /// row moved under the caller, so concurrent transitions on the same
    /// booking serialize instead of clobbering each other.
    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment_status: PaymentState,
        expected_version: i64,
    ) -> Result<(), StoreError>;

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError>;

    async fn list_bookings_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError>;

    /// Most recent payment attempt for the booking, if any.
    async fn active_payment(&self, booking_id: Uuid) -> Result<Option<Payment>, StoreError>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        transaction_id: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn list_payments(&self) -> Result<Vec<Payment>, StoreError>;
}

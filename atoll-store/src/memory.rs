use async_trait::async_trait;
use atoll_core::{BookingStore, PackageStore, PaymentStore, ReserveOutcome, StoreError};
use atoll_domain::{Booking, BookingStatus, Package, Payment, PaymentState, PaymentStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory store implementing all three repository traits.
///
/// Each package sits behind its own mutex, so reserve is a single-writer
/// check-and-increment per package id while distinct packages proceed fully
/// in parallel. Backs the test suites and small single-node deployments.
#[derive(Default)]
pub struct MemoryStore {
    packages: RwLock<HashMap<Uuid, Arc<Mutex<Package>>>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    payments: RwLock<Vec<Payment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageStore for MemoryStore {
    async fn upsert_package(&self, package: &Package) -> Result<(), StoreError> {
        let mut map = self.packages.write().map_err(poisoned)?;
        match map.get(&package.id) {
            Some(slot) => {
                let mut existing = slot.lock().map_err(poisoned)?;
                // booked is owned by the ledger; admin edits never touch it
                let booked = existing.booked;
                *existing = package.clone();
                existing.booked = booked;
                existing.updated_at = Utc::now();
            }
            None => {
                map.insert(package.id, Arc::new(Mutex::new(package.clone())));
            }
        }
        Ok(())
    }

    async fn get_package(&self, id: Uuid) -> Result<Option<Package>, StoreError> {
        let map = self.packages.read().map_err(poisoned)?;
        match map.get(&id) {
            Some(slot) => Ok(Some(slot.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn list_packages(&self) -> Result<Vec<Package>, StoreError> {
        let map = self.packages.read().map_err(poisoned)?;
        let mut packages = Vec::with_capacity(map.len());
        for slot in map.values() {
            packages.push(slot.lock().map_err(poisoned)?.clone());
        }
        packages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(packages)
    }

    async fn try_reserve(&self, id: Uuid, count: u32) -> Result<ReserveOutcome, StoreError> {
        let slot = {
            let map = self.packages.read().map_err(poisoned)?;
            match map.get(&id) {
                Some(slot) => slot.clone(),
                None => return Ok(ReserveOutcome::NotFound),
            }
        };

        let mut package = slot.lock().map_err(poisoned)?;
        if package.booked as i64 + count as i64 <= package.capacity as i64 {
            package.booked += count as i32;
            package.updated_at = Utc::now();
            Ok(ReserveOutcome::Reserved)
        } else {
            Ok(ReserveOutcome::Insufficient {
                available: (package.capacity - package.booked).max(0),
            })
        }
    }

    async fn release(&self, id: Uuid, count: u32) -> Result<(), StoreError> {
        let slot = {
            let map = self.packages.read().map_err(poisoned)?;
            match map.get(&id) {
                Some(slot) => slot.clone(),
                None => return Ok(()),
            }
        };

        let mut package = slot.lock().map_err(poisoned)?;
        package.booked = (package.booked - count as i32).max(0);
        package.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut map = self.bookings.write().map_err(poisoned)?;
        // retried writes are keyed by the booking id and must not double-apply
        if !map.contains_key(&booking.id) {
            map.insert(booking.id, booking.clone());
        }
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let map = self.bookings.read().map_err(poisoned)?;
        Ok(map.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment_status: PaymentState,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let mut map = self.bookings.write().map_err(poisoned)?;
        let booking = map
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", id)))?;

        if booking.version != expected_version {
            return Err(StoreError::VersionConflict {
                entity: "booking",
                id,
            });
        }

        booking.status = status;
        booking.payment_status = payment_status;
        booking.version += 1;
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let map = self.bookings.read().map_err(poisoned)?;
        let mut bookings: Vec<Booking> = map.values().cloned().collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(bookings)
    }

    async fn list_bookings_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let map = self.bookings.read().map_err(poisoned)?;
        let mut bookings: Vec<Booking> = map
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(bookings)
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut payments = self.payments.write().map_err(poisoned)?;
        if !payments.iter().any(|p| p.id == payment.id) {
            payments.push(payment.clone());
        }
        Ok(())
    }

    async fn active_payment(&self, booking_id: Uuid) -> Result<Option<Payment>, StoreError> {
        let payments = self.payments.read().map_err(poisoned)?;
        Ok(payments
            .iter()
            .rev()
            .find(|p| p.booking_id == booking_id)
            .cloned())
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: PaymentStatus,
        transaction_id: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut payments = self.payments.write().map_err(poisoned)?;
        let payment = payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("payment {}", id)))?;

        payment.status = status;
        if let Some(txn) = transaction_id {
            payment.transaction_id = Some(txn.to_string());
        }
        payment.updated_at = Utc::now();
        Ok(())
    }

    async fn list_payments(&self) -> Result<Vec<Payment>, StoreError> {
        let payments = self.payments.read().map_err(poisoned)?;
        Ok(payments.clone())
    }
}

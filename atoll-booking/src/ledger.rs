use atoll_core::{BookingError, PackageStore, ReserveOutcome};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Owns all mutation of a package's (capacity, booked) pair.
///
/// The check-and-increment is delegated to the store's atomic conditional
/// update, so concurrent reserves on the same package can never jointly
/// overbook it. Different packages are fully independent.
#[derive(Clone)]
pub struct CapacityLedger {
    packages: Arc<dyn PackageStore>,
}

impl CapacityLedger {
    pub fn new(packages: Arc<dyn PackageStore>) -> Self {
        Self { packages }
    }

    /// Reserve `count` travelers on the package, all or nothing.
    pub async fn reserve(&self, package_id: Uuid, count: u32) -> Result<(), BookingError> {
        if count == 0 {
            return Err(BookingError::InvalidArgument(
                "reserve count must be positive".to_string(),
            ));
        }

        match self.packages.try_reserve(package_id, count).await? {
            ReserveOutcome::Reserved => {
                debug!(%package_id, count, "capacity reserved");
                Ok(())
            }
            ReserveOutcome::Insufficient { available } => Err(BookingError::CapacityExceeded {
                package_id,
                requested: count,
                available: available.max(0) as u32,
            }),
            ReserveOutcome::NotFound => {
                Err(BookingError::NotFound(format!("package {}", package_id)))
            }
        }
    }

    /// Return `count` travelers to the package. Clamped at a floor of 0 by
    /// the store, so a double release cannot drive the counter negative.
    pub async fn release(&self, package_id: Uuid, count: u32) -> Result<(), BookingError> {
        if count == 0 {
            return Err(BookingError::InvalidArgument(
                "release count must be positive".to_string(),
            ));
        }

        self.packages.release(package_id, count).await?;
        debug!(%package_id, count, "capacity released");
        Ok(())
    }

    /// Compensating release after a failed downstream step. Never fails the
    /// surrounding operation; a store error here is logged and swallowed so
    /// the original failure stays the user-visible outcome.
    pub async fn release_or_log(&self, package_id: Uuid, count: u32) {
        if let Err(err) = self.packages.release(package_id, count).await {
            warn!(%package_id, count, %err, "compensating release failed");
        }
    }
}

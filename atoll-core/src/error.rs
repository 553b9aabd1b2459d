use atoll_domain::{BookingStatus, PaymentStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking field a traveler-detail violation points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TravelerField {
    Name,
    Email,
    Phone,
    PassportNumber,
    BirthDate,
    Gender,
    DepartureDate,
    TravelerCount,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationReason {
    Blank,
    BadFormat,
    NotADate,
    NotInPast,
    UnknownValue,
    NotOffered,
    OutOfRange,
}

/// A single validation failure, tagged so the storefront can highlight every
/// offending field in one round trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub traveler_index: usize,
    pub field: TravelerField,
    pub reason: ViolationReason,
}

impl Violation {
    pub fn new(traveler_index: usize, field: TravelerField, reason: ViolationReason) -> Self {
        Self {
            traveler_index,
            field,
            reason,
        }
    }
}

/// Failures surfaced by the storage adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found: {0}")]
    NotFound(String),

    #[error("stale version writing {entity} {id}")]
    VersionConflict { entity: &'static str, id: Uuid },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Error taxonomy of the booking core. Every variant is a recoverable
/// per-request outcome; none is treated as process-fatal.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("validation failed with {} violation(s)", .0.len())]
    ValidationFailed(Vec<Violation>),

    #[error("capacity exceeded for package {package_id}: requested {requested}, available {available}")]
    CapacityExceeded {
        package_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("invalid booking transition {} -> {}", from.as_str(), to.as_str())]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("invalid payment transition {from:?} -> {to:?}")]
    InvalidPaymentTransition {
        from: Option<PaymentStatus>,
        to: PaymentStatus,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

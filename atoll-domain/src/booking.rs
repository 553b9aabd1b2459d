use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// Payment state carried on the booking row, distinct from the per-attempt
/// `PaymentStatus` on payment rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Unpaid,
    Paid,
    Refunded,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Unpaid => "UNPAID",
            PaymentState::Paid => "PAID",
            PaymentState::Refunded => "REFUNDED",
            PaymentState::Failed => "FAILED",
        }
    }
}

impl FromStr for PaymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(PaymentState::Unpaid),
            "PAID" => Ok(PaymentState::Paid),
            "REFUNDED" => Ok(PaymentState::Refunded),
            "FAILED" => Ok(PaymentState::Failed),
            other => Err(format!("unknown payment state: {}", other)),
        }
    }
}

/// What a booking reserves. Exactly one target kind per booking; villa stays
/// share the booking lifecycle but do not consume package capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingTarget {
    Package(Uuid),
    Villa(Uuid),
}

impl BookingTarget {
    pub fn id(&self) -> Uuid {
        match self {
            BookingTarget::Package(id) | BookingTarget::Villa(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BookingTarget::Package(_) => "PACKAGE",
            BookingTarget::Villa(_) => "VILLA",
        }
    }

    pub fn package_id(&self) -> Option<Uuid> {
        match self {
            BookingTarget::Package(id) => Some(*id),
            BookingTarget::Villa(_) => None,
        }
    }

    pub fn from_parts(kind: &str, id: Uuid) -> Result<Self, String> {
        match kind {
            "PACKAGE" => Ok(BookingTarget::Package(id)),
            "VILLA" => Ok(BookingTarget::Villa(id)),
            other => Err(format!("unknown booking target kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}

/// Per-traveler record owned by its booking. Fields arrive as raw strings
/// from the storefront form and are checked by the traveler validator before
/// a booking is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TravelerDetail {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub passport_number: String,
    /// ISO 8601 calendar date, e.g. "1990-04-01".
    pub birth_date: String,
    /// "male" or "female".
    pub gender: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub target: BookingTarget,
    pub user_id: Uuid,
    pub traveler_count: u32,
    pub traveler_details: Vec<TravelerDetail>,
    pub special_requests: Option<String>,
    pub status: BookingStatus,
    pub payment_status: PaymentState,
    /// Snapshot of unit price x traveler count at creation. Never recomputed
    /// from the package's current price.
    pub total_price: i64,
    pub departure_date: Option<NaiveDate>,
    /// Optimistic concurrency guard for status writes.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        target: BookingTarget,
        user_id: Uuid,
        traveler_details: Vec<TravelerDetail>,
        special_requests: Option<String>,
        unit_price: i64,
        departure_date: Option<NaiveDate>,
    ) -> Self {
        let now = Utc::now();
        let traveler_count = traveler_details.len() as u32;
        Self {
            id: Uuid::new_v4(),
            target,
            user_id,
            traveler_count,
            traveler_details,
            special_requests,
            status: BookingStatus::Pending,
            payment_status: PaymentState::Unpaid,
            total_price: unit_price * traveler_count as i64,
            departure_date,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tour package offered by the storefront.
///
/// `booked` is the authoritative reserved-traveler counter and is only ever
/// mutated through the capacity ledger; admin edits touch the descriptive
/// fields but never this pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: Uuid,
    pub name: String,
    /// Maximum travelers this package can accept.
    pub capacity: i32,
    /// Travelers currently reserved. Invariant: 0 <= booked <= capacity.
    pub booked: i32,
    /// Unit price per traveler, in minor currency units.
    pub price: i64,
    /// Offered departure dates, kept sorted ascending.
    pub departure_dates: Vec<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    pub fn new(name: String, capacity: i32, price: i64, mut departure_dates: Vec<NaiveDate>) -> Self {
        departure_dates.sort();
        departure_dates.dedup();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            capacity,
            booked: 0,
            price,
            departure_dates,
            created_at: now,
            updated_at: now,
        }
    }

    /// Seats still open for reservation.
    pub fn available(&self) -> i32 {
        (self.capacity - self.booked).max(0)
    }

    pub fn offers_departure(&self, date: NaiveDate) -> bool {
        self.departure_dates.binary_search(&date).is_ok()
    }
}

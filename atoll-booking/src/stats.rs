use atoll_core::{BookingError, BookingStore, PackageStore, PaymentStore};
use atoll_domain::{Booking, BookingStatus, PaymentState, PaymentStatus};
use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

const RECENT_CANCELLATIONS: usize = 10;

#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyBucket {
    /// "YYYY-MM".
    pub month: String,
    pub bookings: u64,
    pub revenue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageRanking {
    pub package_id: Uuid,
    pub name: String,
    pub bookings: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationSummary {
    pub booking_id: Uuid,
    pub package_name: String,
    pub traveler_count: u32,
    pub cancelled_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_bookings: u64,
    pub by_status: StatusCounts,
    /// Sum of totalPrice over Paid bookings.
    pub revenue: i64,
    /// Sum refunded back out, from the payment attempt history.
    pub refunded_total: i64,
    pub monthly: Vec<MonthlyBucket>,
    pub top_packages: Vec<PackageRanking>,
    pub recent_cancellations: Vec<CancellationSummary>,
}

/// Read-only statistics over bookings, payments and packages for the admin
/// dashboard. Never mutates anything; a dangling package reference renders
/// as "unknown" instead of failing the whole aggregation.
pub struct AdminAggregator {
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentStore>,
    packages: Arc<dyn PackageStore>,
    top_n: usize,
}

impl AdminAggregator {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentStore>,
        packages: Arc<dyn PackageStore>,
        top_n: usize,
    ) -> Self {
        Self {
            bookings,
            payments,
            packages,
            top_n,
        }
    }

    pub async fn compute_stats(&self) -> Result<DashboardStats, BookingError> {
        let bookings = self.bookings.list_bookings().await?;
        let payments = self.payments.list_payments().await?;
        let packages = self.packages.list_packages().await?;

        let names: HashMap<Uuid, String> =
            packages.into_iter().map(|p| (p.id, p.name)).collect();

        let mut by_status = StatusCounts::default();
        let mut revenue = 0i64;
        let mut monthly: BTreeMap<String, (u64, i64)> = BTreeMap::new();
        let mut per_package: HashMap<Uuid, u64> = HashMap::new();

        for booking in &bookings {
            match booking.status {
                BookingStatus::Pending => by_status.pending += 1,
                BookingStatus::Confirmed => by_status.confirmed += 1,
                BookingStatus::Completed => by_status.completed += 1,
                BookingStatus::Cancelled => by_status.cancelled += 1,
            }

            let paid = booking.payment_status == PaymentState::Paid;
            if paid {
                revenue += booking.total_price;
            }

            let month = format!(
                "{:04}-{:02}",
                booking.created_at.year(),
                booking.created_at.month()
            );
            let bucket = monthly.entry(month).or_insert((0, 0));
            bucket.0 += 1;
            if paid {
                bucket.1 += booking.total_price;
            }

            if let Some(package_id) = booking.target.package_id() {
                *per_package.entry(package_id).or_insert(0) += 1;
            }
        }

        let refunded_total = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Refunded)
            .map(|p| p.amount)
            .sum();

        let mut top_packages: Vec<PackageRanking> = per_package
            .into_iter()
            .map(|(package_id, count)| PackageRanking {
                package_id,
                name: resolve_name(&names, package_id),
                bookings: count,
            })
            .collect();
        top_packages.sort_by(|a, b| b.bookings.cmp(&a.bookings).then(a.name.cmp(&b.name)));
        top_packages.truncate(self.top_n);

        let recent_cancellations = recent_cancellations(&bookings, &names);

        Ok(DashboardStats {
            total_bookings: bookings.len() as u64,
            by_status,
            revenue,
            refunded_total,
            monthly: monthly
                .into_iter()
                .map(|(month, (count, amount))| MonthlyBucket {
                    month,
                    bookings: count,
                    revenue: amount,
                })
                .collect(),
            top_packages,
            recent_cancellations,
        })
    }
}

fn resolve_name(names: &HashMap<Uuid, String>, package_id: Uuid) -> String {
    names
        .get(&package_id)
        .cloned()
        .unwrap_or_else(|| "unknown".to_string())
}

fn recent_cancellations(
    bookings: &[Booking],
    names: &HashMap<Uuid, String>,
) -> Vec<CancellationSummary> {
    let mut cancelled: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Cancelled)
        .collect();
    cancelled.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    cancelled
        .into_iter()
        .take(RECENT_CANCELLATIONS)
        .map(|b| CancellationSummary {
            booking_id: b.id,
            package_name: b
                .target
                .package_id()
                .map(|id| resolve_name(names, id))
                .unwrap_or_else(|| "unknown".to_string()),
            traveler_count: b.traveler_count,
            cancelled_at: b.updated_at,
        })
        .collect()
}

use crate::ledger::CapacityLedger;
use crate::state::BookingStateMachine;
use crate::validator::TravelerDetailValidator;
use atoll_core::{
    BookingError, BookingPolicy, BookingStore, PackageStore, PaymentStore, RequestIdentity,
    StoreError, TravelerField, Violation, ViolationReason,
};
use atoll_domain::{
    Booking, BookingStatus, BookingTarget, PaymentState, PaymentStatus, TravelerDetail,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub package_id: Uuid,
    pub traveler_details: Vec<TravelerDetail>,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub departure_date: Option<NaiveDate>,
}

/// Orchestrates validation, capacity reservation and booking persistence as
/// one compensatable unit. This is the component callers actually invoke.
pub struct ReservationCoordinator {
    packages: Arc<dyn PackageStore>,
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentStore>,
    ledger: CapacityLedger,
    policy: BookingPolicy,
}

impl ReservationCoordinator {
    pub fn new(
        packages: Arc<dyn PackageStore>,
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentStore>,
        policy: BookingPolicy,
    ) -> Self {
        let ledger = CapacityLedger::new(packages.clone());
        Self {
            packages,
            bookings,
            payments,
            ledger,
            policy,
        }
    }

    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    /// Create a booking: validate travelers, reserve capacity, snapshot the
    /// price and persist the Pending row. A reservation never outlives a
    /// failed persistence step.
    pub async fn create_booking(
        &self,
        identity: &RequestIdentity,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        let traveler_count = request.traveler_details.len() as u32;
        if traveler_count == 0 {
            return Err(BookingError::ValidationFailed(vec![Violation::new(
                0,
                TravelerField::TravelerCount,
                ViolationReason::OutOfRange,
            )]));
        }
        if traveler_count > self.policy.max_travelers_per_booking {
            return Err(BookingError::InvalidArgument(format!(
                "traveler count {} exceeds the per-booking limit of {}",
                traveler_count, self.policy.max_travelers_per_booking
            )));
        }

        let package = self
            .packages
            .get_package(request.package_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("package {}", request.package_id)))?;

        let mut violations = Vec::new();
        if let Err(more) =
            TravelerDetailValidator::validate(&request.traveler_details, Utc::now().date_naive())
        {
            violations.extend(more);
        }
        if let Some(date) = request.departure_date {
            if !package.offers_departure(date) {
                violations.push(Violation::new(
                    0,
                    TravelerField::DepartureDate,
                    ViolationReason::NotOffered,
                ));
            }
        }
        if !violations.is_empty() {
            return Err(BookingError::ValidationFailed(violations));
        }

        self.ledger.reserve(package.id, traveler_count).await?;

        let booking = Booking::new(
            BookingTarget::Package(package.id),
            identity.user_id,
            request.traveler_details,
            request.special_requests,
            package.price,
            request.departure_date,
        );

        if let Err(err) = self.bookings.insert_booking(&booking).await {
            warn!(
                booking_id = %booking.id,
                package_id = %package.id,
                %err,
                "booking persistence failed, compensating reservation"
            );
            self.ledger.release_or_log(package.id, traveler_count).await;
            return Err(BookingError::Persistence(err));
        }

        info!(
            booking_id = %booking.id,
            package_id = %package.id,
            traveler_count,
            total_price = booking.total_price,
            "booking created"
        );
        Ok(booking)
    }

    /// Cancel a booking through the state machine, releasing its capacity.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> Result<(), BookingError> {
        self.transition_booking(booking_id, BookingStatus::Cancelled)
            .await
    }

    /// Admin-driven manual transition, validated by the state machine. A
    /// transition into Cancelled pairs exactly one capacity release with the
    /// status write; the write is version-guarded, so a racing transition on
    /// the same booking forces a reload instead of a silent clobber.
    pub async fn transition_booking(
        &self,
        booking_id: Uuid,
        target: BookingStatus,
    ) -> Result<(), BookingError> {
        let mut attempts = 0;
        loop {
            match self.try_transition(booking_id, target).await {
                Err(BookingError::Persistence(StoreError::VersionConflict { .. }))
                    if attempts + 1 < MAX_WRITE_ATTEMPTS =>
                {
                    attempts += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_transition(
        &self,
        booking_id: Uuid,
        target: BookingStatus,
    ) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;

        let transition = BookingStateMachine::plan(booking.status, target)?;

        // A cancelled booking may never stay Paid: the cancellation carries
        // the refund with it.
        let cancelling_paid =
            transition.releases_capacity && booking.payment_status == PaymentState::Paid;
        let payment_status = if cancelling_paid {
            PaymentState::Refunded
        } else {
            booking.payment_status
        };

        // The version-guarded write is the commit point; payment and ledger
        // side effects follow only the single winning write.
        self.bookings
            .update_status(booking_id, transition.to, payment_status, booking.version)
            .await?;

        if cancelling_paid {
            if let Some(payment) = self.payments.active_payment(booking_id).await? {
                if payment.status == PaymentStatus::Completed {
                    self.payments
                        .update_payment_status(payment.id, PaymentStatus::Refunded, None)
                        .await?;
                }
            }
        }

        if transition.releases_capacity {
            if let Some(package_id) = booking.target.package_id() {
                self.ledger
                    .release(package_id, booking.traveler_count)
                    .await?;
            }
        }

        info!(
            %booking_id,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            "booking transitioned"
        );
        Ok(())
    }
}

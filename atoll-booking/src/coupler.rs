use crate::ledger::CapacityLedger;
use crate::state::BookingStateMachine;
use atoll_core::{BookingError, BookingPolicy, BookingStore, PaymentStore, StoreError};
use atoll_domain::{Booking, BookingStatus, Payment, PaymentMethod, PaymentState, PaymentStatus};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_WRITE_ATTEMPTS: usize = 3;

/// A payment-status event from the gateway webhook or manual reconciliation.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    pub status: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
}

impl PaymentEvent {
    pub fn new(status: PaymentStatus) -> Self {
        Self {
            status,
            transaction_id: None,
            method: None,
        }
    }

    pub fn with_transaction(status: PaymentStatus, transaction_id: &str) -> Self {
        Self {
            status,
            transaction_id: Some(transaction_id.to_string()),
            method: None,
        }
    }
}

/// Applies payment events to the active payment attempt and keeps the
/// booking's payment state and lifecycle status coupled to it.
///
/// Event application is idempotent: redelivering the status the booking
/// already carries is a no-op, so duplicate webhook delivery is harmless.
pub struct PaymentCoupler {
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentStore>,
    ledger: CapacityLedger,
    policy: BookingPolicy,
}

impl PaymentCoupler {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentStore>,
        ledger: CapacityLedger,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            bookings,
            payments,
            ledger,
            policy,
        }
    }

    pub async fn apply_payment_event(
        &self,
        booking_id: Uuid,
        event: PaymentEvent,
    ) -> Result<(), BookingError> {
        let mut attempts = 0;
        loop {
            match self.try_apply(booking_id, &event).await {
                Err(BookingError::Persistence(StoreError::VersionConflict { .. }))
                    if attempts + 1 < MAX_WRITE_ATTEMPTS =>
                {
                    attempts += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_apply(&self, booking_id: Uuid, event: &PaymentEvent) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;
        let active = self.payments.active_payment(booking_id).await?;

        match event.status {
            PaymentStatus::Pending => self.open_attempt(&booking, active, event).await,
            PaymentStatus::Completed => self.settle(&booking, active, event).await,
            PaymentStatus::Failed => self.fail(&booking, active).await,
            PaymentStatus::Refunded => self.refund(&booking, active).await,
        }
    }

    /// Open a payment attempt. Legal on a fresh booking or after a failed
    /// attempt; a settled or refunded booking cannot be reopened.
    async fn open_attempt(
        &self,
        booking: &Booking,
        active: Option<Payment>,
        event: &PaymentEvent,
    ) -> Result<(), BookingError> {
        match active.as_ref().map(|p| p.status) {
            Some(PaymentStatus::Pending) => return Ok(()),
            Some(PaymentStatus::Completed) | Some(PaymentStatus::Refunded) => {
                return Err(BookingError::InvalidPaymentTransition {
                    from: active.map(|p| p.status),
                    to: PaymentStatus::Pending,
                })
            }
            Some(PaymentStatus::Failed) | None => {}
        }

        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::InvalidArgument(
                "cannot open a payment attempt for a cancelled booking".to_string(),
            ));
        }

        let method = event.method.unwrap_or(PaymentMethod::Manual);
        let payment = Payment::new(booking.id, booking.total_price, method);
        self.payments.insert_payment(&payment).await?;

        if booking.payment_status != PaymentState::Unpaid {
            self.bookings
                .update_status(
                    booking.id,
                    booking.status,
                    PaymentState::Unpaid,
                    booking.version,
                )
                .await?;
        }

        info!(booking_id = %booking.id, payment_id = %payment.id, "payment attempt opened");
        Ok(())
    }

    /// Gateway settled the active attempt: booking becomes Paid, and a paid
    /// Pending booking is confirmed.
    async fn settle(
        &self,
        booking: &Booking,
        active: Option<Payment>,
        event: &PaymentEvent,
    ) -> Result<(), BookingError> {
        if booking.payment_status == PaymentState::Paid {
            return Ok(());
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::InvalidArgument(
                "cannot settle payment for a cancelled booking".to_string(),
            ));
        }

        let payment = match active {
            Some(p) if p.status == PaymentStatus::Pending || p.status == PaymentStatus::Completed => p,
            other => {
                return Err(BookingError::InvalidPaymentTransition {
                    from: other.map(|p| p.status),
                    to: PaymentStatus::Completed,
                })
            }
        };

        if payment.status != PaymentStatus::Completed {
            self.payments
                .update_payment_status(
                    payment.id,
                    PaymentStatus::Completed,
                    event.transaction_id.as_deref(),
                )
                .await?;
        }

        let next_status = if booking.status == BookingStatus::Pending {
            BookingStateMachine::plan(booking.status, BookingStatus::Confirmed)?.to
        } else {
            booking.status
        };

        self.bookings
            .update_status(booking.id, next_status, PaymentState::Paid, booking.version)
            .await?;

        info!(booking_id = %booking.id, status = next_status.as_str(), "payment settled");
        Ok(())
    }

    async fn fail(&self, booking: &Booking, active: Option<Payment>) -> Result<(), BookingError> {
        if booking.payment_status == PaymentState::Failed {
            return Ok(());
        }

        let payment = match active {
            Some(p) if p.status == PaymentStatus::Pending || p.status == PaymentStatus::Failed => p,
            other => {
                return Err(BookingError::InvalidPaymentTransition {
                    from: other.map(|p| p.status),
                    to: PaymentStatus::Failed,
                })
            }
        };

        if payment.status != PaymentStatus::Failed {
            self.payments
                .update_payment_status(payment.id, PaymentStatus::Failed, None)
                .await?;
        }

        self.bookings
            .update_status(
                booking.id,
                booking.status,
                PaymentState::Failed,
                booking.version,
            )
            .await?;

        info!(booking_id = %booking.id, "payment attempt failed");
        Ok(())
    }

    /// Record a refund. Pending/Confirmed bookings are cancelled with the
    /// paired capacity release; a Completed booking keeps its status when
    /// policy allows post-travel refunds at all.
    async fn refund(&self, booking: &Booking, active: Option<Payment>) -> Result<(), BookingError> {
        if booking.payment_status == PaymentState::Refunded {
            return Ok(());
        }

        if booking.status == BookingStatus::Completed && !self.policy.allow_refund_after_completion
        {
            return Err(BookingError::InvalidArgument(
                "refunds are not accepted after travel completion".to_string(),
            ));
        }

        let payment = match active {
            Some(p) if p.status == PaymentStatus::Completed || p.status == PaymentStatus::Refunded => p,
            other => {
                return Err(BookingError::InvalidPaymentTransition {
                    from: other.map(|p| p.status),
                    to: PaymentStatus::Refunded,
                })
            }
        };

        if payment.status != PaymentStatus::Refunded {
            self.payments
                .update_payment_status(payment.id, PaymentStatus::Refunded, None)
                .await?;
        }

        match booking.status {
            BookingStatus::Pending | BookingStatus::Confirmed => {
                let transition =
                    BookingStateMachine::plan(booking.status, BookingStatus::Cancelled)?;
                self.bookings
                    .update_status(
                        booking.id,
                        transition.to,
                        PaymentState::Refunded,
                        booking.version,
                    )
                    .await?;
                if let Some(package_id) = booking.target.package_id() {
                    self.ledger
                        .release(package_id, booking.traveler_count)
                        .await?;
                }
                info!(booking_id = %booking.id, "refund recorded, booking cancelled");
            }
            BookingStatus::Completed | BookingStatus::Cancelled => {
                self.bookings
                    .update_status(
                        booking.id,
                        booking.status,
                        PaymentState::Refunded,
                        booking.version,
                    )
                    .await?;
                info!(booking_id = %booking.id, status = booking.status.as_str(), "refund recorded");
            }
        }

        Ok(())
    }
}

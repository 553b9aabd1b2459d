use atoll_core::BookingError;
use atoll_domain::BookingStatus;

/// A validated move between booking statuses.
///
/// `releases_capacity` is set when the move enters Cancelled from a
/// capacity-holding status; the coordinator must pair exactly one ledger
/// release with such a transition. The state machine itself never touches
/// the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub releases_capacity: bool,
}

/// Enforces the legal booking lifecycle:
/// Pending -> Confirmed | Cancelled, Confirmed -> Completed | Cancelled.
/// Completed and Cancelled are terminal.
pub struct BookingStateMachine;

impl BookingStateMachine {
    pub fn plan(from: BookingStatus, to: BookingStatus) -> Result<Transition, BookingError> {
        use BookingStatus::*;

        let legal = matches!(
            (from, to),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        );

        if !legal {
            return Err(BookingError::InvalidTransition { from, to });
        }

        Ok(Transition {
            from,
            to,
            releases_capacity: to == Cancelled,
        })
    }
}

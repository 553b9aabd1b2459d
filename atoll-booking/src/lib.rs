pub mod coordinator;
pub mod coupler;
pub mod ledger;
pub mod state;
pub mod stats;
pub mod validator;

pub use coordinator::{CreateBookingRequest, ReservationCoordinator};
pub use coupler::{PaymentCoupler, PaymentEvent};
pub use ledger::CapacityLedger;
pub use state::{BookingStateMachine, Transition};
pub use stats::{AdminAggregator, DashboardStats};
pub use validator::TravelerDetailValidator;

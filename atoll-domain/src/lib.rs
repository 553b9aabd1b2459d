pub mod booking;
pub mod package;
pub mod payment;

pub use booking::{Booking, BookingStatus, BookingTarget, Gender, PaymentState, TravelerDetail};
pub use package::Package;
pub use payment::{Payment, PaymentMethod, PaymentStatus};

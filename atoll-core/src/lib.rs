pub mod error;
pub mod identity;
pub mod policy;
pub mod repository;

pub use error::{BookingError, StoreError, TravelerField, Violation, ViolationReason};
pub use identity::RequestIdentity;
pub use policy::BookingPolicy;
pub use repository::{BookingStore, PackageStore, PaymentStore, ReserveOutcome};

pub type BookingResult<T> = Result<T, BookingError>;

//! Collaborator traits and in-memory implementations used by the sagas.

pub mod identity;
pub mod payment;

pub use identity::{
    Identity, IdentityCall, IdentityError, IdentityRecord, InMemoryIdentityService, ServerStats,
};
pub use payment::{ConnectedAccountStatus, InMemoryPaymentProcessor, PaymentError, PaymentProcessor};

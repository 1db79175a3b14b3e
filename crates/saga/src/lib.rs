//! Saga coordination for merchant onboarding.
//!
//! A saga is an ordered list of steps, each with an optional compensating
//! action. The coordinator runs the steps in order and, when one fails,
//! compensates the committed ones in reverse order.
//!
//! On top of the engine this crate provides:
//! - The identity and payment-processor capabilities with in-memory fakes
//! - A bounded-retry connector used to reach collaborators at startup
//! - [`MerchantOnboarding`], which assembles the onboarding sagas

pub mod connector;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod onboarding;
pub mod outcome;
pub mod saga;
pub mod services;
pub mod state;
pub mod step;

pub use connector::{RetryPolicy, connect_with_retry, retry};
pub use context::SagaContext;
pub use coordinator::SagaCoordinator;
pub use error::SagaError;
pub use onboarding::{AccountChanges, AccountLocks, MerchantOnboarding, OnboardingLink};
pub use outcome::{CompensationError, SagaFailure, SagaResult, SagaSummary};
pub use saga::Saga;
pub use services::{
    ConnectedAccountStatus, Identity, IdentityCall, IdentityError, InMemoryIdentityService,
    InMemoryPaymentProcessor, PaymentError, PaymentProcessor, ServerStats,
};
pub use state::SagaState;
pub use step::{Action, Handoff, Step};

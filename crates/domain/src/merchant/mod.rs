//! Merchant account and onboarding types.

mod account;
mod onboarding;
mod state;

pub use account::{MerchantAccount, validate_email};
pub use onboarding::{advance, advance_until};
pub use state::{OnboardingDetail, OnboardingState};

//! Domain layer for merchant onboarding.
//!
//! This crate provides:
//! - The `MerchantAccount` aggregate and its validation rules
//! - Onboarding detail/state enums
//! - The pure onboarding state machine (`advance`)

pub mod error;
pub mod merchant;

pub use error::DomainError;
pub use merchant::{
    MerchantAccount, OnboardingDetail, OnboardingState, advance, advance_until, validate_email,
};

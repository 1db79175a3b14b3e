//! Identifier types shared across the onboarding crates.

mod types;

pub use types::{AccountId, ConnectedAccountId, EmployerId, IdentityId, RunId};

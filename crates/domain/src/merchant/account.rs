//! Merchant account aggregate.

use chrono::{DateTime, Utc};
use common::{AccountId, ConnectedAccountId, EmployerId, IdentityId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::merchant::state::{OnboardingDetail, OnboardingState};

/// A merchant (business) account moving through onboarding.
///
/// Accounts are never physically removed; deactivation is a state change so
/// the account can be recovered later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantAccount {
    /// Assigned by the ledger on creation.
    pub id: AccountId,
    /// Assigned by the identity service.
    pub identity_id: IdentityId,
    /// Assigned by the payment processor once payment onboarding starts.
    pub connected_account_id: Option<ConnectedAccountId>,
    pub business_name: String,
    pub business_email: String,
    pub employer_id: EmployerId,
    pub active: bool,
    pub onboarding_state: OnboardingState,
    pub onboarding_detail: OnboardingDetail,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MerchantAccount {
    /// Creates an active, not-yet-onboarded account that has not been stored.
    pub fn new(
        business_name: impl Into<String>,
        business_email: impl Into<String>,
        employer_id: EmployerId,
    ) -> Self {
        Self {
            id: AccountId::default(),
            identity_id: IdentityId::default(),
            connected_account_id: None,
            business_name: business_name.into(),
            business_email: business_email.into(),
            employer_id,
            active: true,
            onboarding_state: OnboardingState::PendingCompletion,
            onboarding_detail: OnboardingDetail::NotStarted,
            created_at: None,
            updated_at: None,
        }
    }

    /// Validates the business attributes supplied by the merchant.
    pub fn validate_profile(&self) -> Result<(), DomainError> {
        if self.business_name.trim().is_empty() {
            return Err(DomainError::validation(
                "business_name",
                "merchant account business name cannot be empty",
            ));
        }
        validate_email(&self.business_email)?;
        if self.employer_id.is_unassigned() {
            return Err(DomainError::validation(
                "employer_id",
                "merchant account employer id cannot be empty",
            ));
        }
        Ok(())
    }

    /// Validates everything the ledger requires before storing the account.
    pub fn validate_for_storage(&self) -> Result<(), DomainError> {
        self.validate_profile()?;
        if self.identity_id.is_unassigned() {
            return Err(DomainError::validation(
                "identity_id",
                "merchant account identity id cannot be empty",
            ));
        }
        self.check_invariants()
    }

    /// Checks the relationship between the active flag, the detail, and the
    /// coarse onboarding state.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if self.onboarding_state == OnboardingState::ActiveAndOnboarded {
            if !self.active {
                return Err(DomainError::InvariantViolation(format!(
                    "inactive account {} reports {}",
                    self.id, self.onboarding_state
                )));
            }
            if !self.onboarding_detail.is_terminal() {
                return Err(DomainError::InvariantViolation(format!(
                    "account {} reports {} at non-terminal phase {}",
                    self.id, self.onboarding_state, self.onboarding_detail
                )));
            }
        }
        Ok(())
    }

    /// Marks the account inactive, demoting the coarse onboarding state.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.onboarding_state = OnboardingState::PendingCompletion;
    }

    /// Marks the account active, recomputing the coarse state from the detail.
    pub fn activate(&mut self) {
        self.active = true;
        self.onboarding_state = if self.onboarding_detail.is_terminal() {
            OnboardingState::ActiveAndOnboarded
        } else {
            OnboardingState::PendingCompletion
        };
    }

    /// Returns true once every onboarding phase is complete.
    pub fn is_fully_onboarded(&self) -> bool {
        self.onboarding_state == OnboardingState::ActiveAndOnboarded
    }
}

/// Validates a business email address.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DomainError::validation(
            "business_email",
            "merchant account business email cannot be empty",
        ));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(DomainError::validation(
            "business_email",
            format!("invalid business email: {email}"),
        )),
    }
}

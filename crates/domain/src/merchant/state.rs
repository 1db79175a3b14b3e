//! Onboarding status enums.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse onboarding state of a merchant account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OnboardingState {
    /// Some onboarding phase is still outstanding.
    #[default]
    PendingCompletion,

    /// Every phase is complete and the account is active.
    ActiveAndOnboarded,
}

impl OnboardingState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingState::PendingCompletion => "PendingCompletion",
            OnboardingState::ActiveAndOnboarded => "ActiveAndOnboarded",
        }
    }
}

impl std::fmt::Display for OnboardingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OnboardingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingCompletion" => Ok(OnboardingState::PendingCompletion),
            "ActiveAndOnboarded" => Ok(OnboardingState::ActiveAndOnboarded),
            other => Err(format!("unknown onboarding state: {other}")),
        }
    }
}

/// Fine-grained onboarding phase.
///
/// Phases only move forward:
/// ```text
/// NotStarted ──► IdentityOnboardingStarted ──► IdentityOnboardingCompleted
///   ──► PaymentOnboardingStarted ──► PaymentOnboardingCompleted
///   ──► CatalogueOnboardingStarted ──► CatalogueOnboardingCompleted
///   ──► ComplianceOnboardingStarted ──► ComplianceOnboardingCompleted
/// ```
///
/// Any stored or serialized value this build does not know decodes to
/// [`OnboardingDetail::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OnboardingDetail {
    #[default]
    NotStarted,
    IdentityOnboardingStarted,
    IdentityOnboardingCompleted,
    PaymentOnboardingStarted,
    PaymentOnboardingCompleted,
    CatalogueOnboardingStarted,
    CatalogueOnboardingCompleted,
    ComplianceOnboardingStarted,
    /// Terminal phase.
    ComplianceOnboardingCompleted,
    #[serde(other)]
    Unrecognized,
}

impl OnboardingDetail {
    /// All known phases in order.
    pub const PHASES: [OnboardingDetail; 9] = [
        OnboardingDetail::NotStarted,
        OnboardingDetail::IdentityOnboardingStarted,
        OnboardingDetail::IdentityOnboardingCompleted,
        OnboardingDetail::PaymentOnboardingStarted,
        OnboardingDetail::PaymentOnboardingCompleted,
        OnboardingDetail::CatalogueOnboardingStarted,
        OnboardingDetail::CatalogueOnboardingCompleted,
        OnboardingDetail::ComplianceOnboardingStarted,
        OnboardingDetail::ComplianceOnboardingCompleted,
    ];

    /// Position of this phase in [`Self::PHASES`], or `None` if unrecognized.
    pub fn ordinal(&self) -> Option<usize> {
        Self::PHASES.iter().position(|phase| phase == self)
    }

    /// Returns the phase that follows this one.
    ///
    /// The terminal phase maps to itself and an unrecognized phase maps
    /// to `NotStarted`.
    pub fn next(&self) -> OnboardingDetail {
        match self {
            OnboardingDetail::NotStarted => OnboardingDetail::IdentityOnboardingStarted,
            OnboardingDetail::IdentityOnboardingStarted => {
                OnboardingDetail::IdentityOnboardingCompleted
            }
            OnboardingDetail::IdentityOnboardingCompleted => {
                OnboardingDetail::PaymentOnboardingStarted
            }
            OnboardingDetail::PaymentOnboardingStarted => {
                OnboardingDetail::PaymentOnboardingCompleted
            }
            OnboardingDetail::PaymentOnboardingCompleted => {
                OnboardingDetail::CatalogueOnboardingStarted
            }
            OnboardingDetail::CatalogueOnboardingStarted => {
                OnboardingDetail::CatalogueOnboardingCompleted
            }
            OnboardingDetail::CatalogueOnboardingCompleted => {
                OnboardingDetail::ComplianceOnboardingStarted
            }
            OnboardingDetail::ComplianceOnboardingStarted => {
                OnboardingDetail::ComplianceOnboardingCompleted
            }
            OnboardingDetail::ComplianceOnboardingCompleted => {
                OnboardingDetail::ComplianceOnboardingCompleted
            }
            OnboardingDetail::Unrecognized => OnboardingDetail::NotStarted,
        }
    }

    /// Returns true if this is the terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OnboardingDetail::ComplianceOnboardingCompleted)
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingDetail::NotStarted => "NotStarted",
            OnboardingDetail::IdentityOnboardingStarted => "IdentityOnboardingStarted",
            OnboardingDetail::IdentityOnboardingCompleted => "IdentityOnboardingCompleted",
            OnboardingDetail::PaymentOnboardingStarted => "PaymentOnboardingStarted",
            OnboardingDetail::PaymentOnboardingCompleted => "PaymentOnboardingCompleted",
            OnboardingDetail::CatalogueOnboardingStarted => "CatalogueOnboardingStarted",
            OnboardingDetail::CatalogueOnboardingCompleted => "CatalogueOnboardingCompleted",
            OnboardingDetail::ComplianceOnboardingStarted => "ComplianceOnboardingStarted",
            OnboardingDetail::ComplianceOnboardingCompleted => "ComplianceOnboardingCompleted",
            OnboardingDetail::Unrecognized => "Unrecognized",
        }
    }
}

impl std::fmt::Display for OnboardingDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OnboardingDetail {
    type Err = std::convert::Infallible;

    /// Never fails: unknown names decode to `Unrecognized`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::PHASES
            .iter()
            .copied()
            .find(|phase| phase.as_str() == s)
            .unwrap_or(OnboardingDetail::Unrecognized))
    }
}

//! Onboarding state machine.
//!
//! Pure transitions over [`MerchantAccount`]; callers persist the result.

use crate::merchant::account::MerchantAccount;
use crate::merchant::state::{OnboardingDetail, OnboardingState};

/// Moves the account to its next onboarding phase.
///
/// The coarse state becomes `ActiveAndOnboarded` only when the new phase is
/// terminal and the account is active. The terminal phase is left unchanged.
/// An unrecognized phase resets to `NotStarted`, it is never treated as an
/// error.
pub fn advance(mut account: MerchantAccount) -> MerchantAccount {
    if account.onboarding_detail.is_terminal() {
        return account;
    }

    let next = account.onboarding_detail.next();
    account.onboarding_detail = next;
    account.onboarding_state = if next.is_terminal() && account.active {
        OnboardingState::ActiveAndOnboarded
    } else {
        OnboardingState::PendingCompletion
    };
    account
}

/// Advances the account until it reaches `target`.
///
/// Never moves past `target` and never moves backwards; an account already at
/// or beyond `target` is returned unchanged. An unrecognized phase is first
/// reset to `NotStarted`.
pub fn advance_until(mut account: MerchantAccount, target: OnboardingDetail) -> MerchantAccount {
    let Some(target_ordinal) = target.ordinal() else {
        return account;
    };

    // One pass per phase plus the reset bounds the loop.
    for _ in 0..=OnboardingDetail::PHASES.len() {
        match account.onboarding_detail.ordinal() {
            Some(current) if current >= target_ordinal => break,
            _ => account = advance(account),
        }
    }
    account
}

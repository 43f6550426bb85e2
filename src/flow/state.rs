//! Flow state machine — which single screen is presented.
//!
//! The flow is a tagged union with exactly one active state at any time.
//! Entry and back-navigation targets are pure functions of the onboarding
//! status snapshot, so re-reading status mid-flow can legitimately change
//! where "back" lands.

use serde::{Deserialize, Serialize};

use crate::status::OnboardingStatus;

/// Funding method selected on the funding form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Wire,
    Bank,
    Crypto,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Card => "card",
            Self::Wire => "wire",
            Self::Bank => "bank",
            Self::Crypto => "crypto",
        };
        write!(f, "{s}")
    }
}

/// The screens of the funding flow. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "screen", content = "method")]
pub enum FlowState {
    /// Landing screen with a fund call-to-action. Reached by backing out of
    /// document signing; its forward transition re-evaluates the entry
    /// branch against a fresh status read.
    EmptyState,
    /// Investor questionnaire (Exhibits A–D) plus signature capture.
    DocumentSigning,
    /// Post-signing interstitial before verification.
    Congratulations,
    /// Identity verification session, with the availability-override
    /// countdown armed.
    KycVerification,
    /// Contribution amount and method selection.
    FundingForm,
    /// Method-specific payment screen.
    PaymentMethod(PaymentMethod),
    /// Degraded something-went-wrong screen with a single retry action.
    Failure,
    /// Terminal: the flow was closed and dispatch is refused.
    Closed,
}

impl FlowState {
    /// Compute the entry screen from the user's persisted status.
    ///
    /// Verified users land directly on the funding form; users who signed
    /// but have not verified resume at verification; everyone else starts
    /// at document signing.
    pub fn entry_for(status: &OnboardingStatus) -> FlowState {
        if status.documents_completed && status.kyc_status.is_verified() {
            FlowState::FundingForm
        } else if status.documents_completed {
            FlowState::KycVerification
        } else {
            FlowState::DocumentSigning
        }
    }

    /// The back-navigation target for this screen.
    ///
    /// This is a fixed reverse mapping, not a history stack. `None` means
    /// "back leaves the flow" (back to portfolio). The funding form is the
    /// one screen whose target is recomputed from the status snapshot: a
    /// user whose flags changed mid-flow backs out to wherever entry would
    /// now route them from.
    pub fn back_target(&self, status: &OnboardingStatus) -> Option<FlowState> {
        match self {
            FlowState::EmptyState => None,
            FlowState::DocumentSigning => Some(FlowState::EmptyState),
            FlowState::Congratulations => Some(FlowState::DocumentSigning),
            FlowState::KycVerification => Some(FlowState::Congratulations),
            FlowState::FundingForm => {
                if !status.documents_completed {
                    Some(FlowState::EmptyState)
                } else if !status.kyc_status.is_verified() {
                    Some(FlowState::KycVerification)
                } else {
                    Some(FlowState::Congratulations)
                }
            }
            FlowState::PaymentMethod(_) => Some(FlowState::FundingForm),
            // No predecessor: back leaves the flow (Failure's recovery
            // action is retry).
            FlowState::Failure | FlowState::Closed => None,
        }
    }

    /// Whether the flow has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyState => write!(f, "empty_state"),
            Self::DocumentSigning => write!(f, "document_signing"),
            Self::Congratulations => write!(f, "congratulations"),
            Self::KycVerification => write!(f, "kyc_verification"),
            Self::FundingForm => write!(f, "funding_form"),
            Self::PaymentMethod(method) => write!(f, "payment_method({method})"),
            Self::Failure => write!(f, "failure"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

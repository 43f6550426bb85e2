//! Funding form screen — contribution amount and method selection.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::flow::state::PaymentMethod;

/// What the funding form submits: how much, and by which rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
}

impl FundingRequest {
    /// Validate the requested contribution against the configured floor.
    pub fn validate(&self, min_contribution: Decimal) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.amount < min_contribution {
            return Err(ValidationError::AmountBelowMinimum {
                amount: self.amount.to_string(),
                minimum: min_contribution.to_string(),
            });
        }
        Ok(())
    }
}

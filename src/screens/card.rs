//! Card payment screen — card detail capture and validation.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Card details entered on the payment screen. Held only for the charge
/// call; never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    /// Card number, digits only (spaces are tolerated and stripped).
    pub number: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvc: String,
    pub cardholder: String,
}

impl CardDetails {
    /// Validate the card fields before any charge is attempted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cardholder.trim().is_empty() {
            return Err(ValidationError::MissingCardholder);
        }

        let digits: String = self.number.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() < 12
            || digits.len() > 19
            || !digits.chars().all(|c| c.is_ascii_digit())
            || !luhn_valid(&digits)
        {
            return Err(ValidationError::InvalidCardNumber);
        }

        if !(self.cvc.len() == 3 || self.cvc.len() == 4)
            || !self.cvc.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::InvalidSecurityCode);
        }

        if !(1..=12).contains(&self.exp_month) {
            return Err(ValidationError::ExpiredCard);
        }
        let now = Utc::now();
        let (year, month) = (now.year(), now.month());
        if self.exp_year < year || (self.exp_year == year && self.exp_month < month) {
            return Err(ValidationError::ExpiredCard);
        }

        Ok(())
    }
}

/// Luhn checksum over an all-digit string.
fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

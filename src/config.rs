//! Flow configuration.

use std::time::Duration;

use rust_decimal::Decimal;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// How long the verification screen waits for a user-driven completion
    /// before the controller applies the availability override.
    pub kyc_override_after: Duration,
    /// Minimum contribution amount accepted by the funding form.
    pub min_contribution: Decimal,
    /// Interval between crypto invoice status polls.
    pub crypto_poll_interval: Duration,
    /// Maximum number of crypto status polls before the watcher gives up.
    pub crypto_poll_attempts: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            kyc_override_after: Duration::from_secs(120),
            min_contribution: Decimal::new(1_000, 0),
            crypto_poll_interval: Duration::from_secs(15),
            crypto_poll_attempts: 120, // 30 minutes at the default interval
        }
    }
}

impl FlowConfig {
    /// Build a config from `FUNDFLOW_*` environment variables, falling back
    /// to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let kyc_override_secs: u64 = std::env::var("FUNDFLOW_KYC_OVERRIDE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.kyc_override_after.as_secs());

        let min_contribution: Decimal = std::env::var("FUNDFLOW_MIN_CONTRIBUTION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.min_contribution);

        let crypto_poll_secs: u64 = std::env::var("FUNDFLOW_CRYPTO_POLL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.crypto_poll_interval.as_secs());

        let crypto_poll_attempts: u32 = std::env::var("FUNDFLOW_CRYPTO_POLL_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.crypto_poll_attempts);

        Self {
            kyc_override_after: Duration::from_secs(kyc_override_secs),
            min_contribution,
            crypto_poll_interval: Duration::from_secs(crypto_poll_secs),
            crypto_poll_attempts,
        }
    }
}

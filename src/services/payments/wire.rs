//! Wire service — registers a wire intent and returns deposit instructions.

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

/// Deposit instructions shown on the wire screen. The reference code ties
/// the incoming wire back to the user's contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireInstructions {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub routing_number: String,
    pub swift_code: String,
    /// Funding reference the depositor must quote.
    pub reference: String,
    pub amount: Decimal,
}

/// Backend contract for wire intents.
#[async_trait]
pub trait WireService: Send + Sync {
    /// Register the intent to wire `amount` and return the instructions to
    /// display. `reference` is generated client-side so the instructions can
    /// be re-rendered without minting a second code.
    async fn create_wire_instructions(
        &self,
        user_id: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<WireInstructions, PaymentError>;
}

const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const REFERENCE_LEN: usize = 8;

/// Generate a funding reference code, e.g. `FF-7KQ2M9XA`. The alphabet
/// omits characters that misread over the phone (0/O, 1/I).
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    let code: String = (0..REFERENCE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..REFERENCE_ALPHABET.len());
            REFERENCE_ALPHABET[idx] as char
        })
        .collect();
    format!("FF-{code}")
}

/// Configuration for the platform wire API.
#[derive(Debug, Clone)]
pub struct WireServiceConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

impl WireServiceConfig {
    /// Build from `FUNDFLOW_PLATFORM_URL` / `FUNDFLOW_PLATFORM_KEY`.
    /// Returns `None` when the URL is unset.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("FUNDFLOW_PLATFORM_URL").ok()?;
        let api_key = std::env::var("FUNDFLOW_PLATFORM_KEY").unwrap_or_default();
        Some(Self {
            base_url,
            api_key: SecretString::from(api_key),
        })
    }
}

/// HTTP wire service backed by the platform API.
pub struct HttpWireService {
    config: WireServiceConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct WireIntentRequest<'a> {
    user_id: &'a str,
    amount: Decimal,
    reference: &'a str,
}

impl HttpWireService {
    pub fn new(config: WireServiceConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WireService for HttpWireService {
    async fn create_wire_instructions(
        &self,
        user_id: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<WireInstructions, PaymentError> {
        let resp = self
            .client
            .post(format!("{}/v1/wire-intents", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&WireIntentRequest {
                user_id,
                amount,
                reference,
            })
            .send()
            .await
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::RequestFailed(format!("{status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_has_expected_shape() {
        let reference = generate_reference();
        assert!(reference.starts_with("FF-"));
        assert_eq!(reference.len(), 3 + REFERENCE_LEN);
        for c in reference[3..].chars() {
            assert!(
                REFERENCE_ALPHABET.contains(&(c as u8)),
                "unexpected character {c} in {reference}"
            );
        }
    }

    #[test]
    fn references_are_unique_enough() {
        let a = generate_reference();
        let b = generate_reference();
        // 32^8 codes; a collision here means the generator is broken.
        assert_ne!(a, b);
    }
}

//! Card gateway — synchronous charge creation.
//!
//! The one payment path that settles inside the flow: the charge call
//! blocks, and only a successful charge closes the screen.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::screens::card::CardDetails;

/// Receipt for a settled card charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardCharge {
    pub charge_id: Uuid,
    pub amount: Decimal,
    pub settled_at: DateTime<Utc>,
}

/// Processor contract for card charges.
#[async_trait]
pub trait CardGateway: Send + Sync {
    /// Create and settle a charge. Declines come back as
    /// [`PaymentError::ChargeDeclined`].
    async fn create_charge(
        &self,
        user_id: &str,
        amount: Decimal,
        card: &CardDetails,
    ) -> Result<CardCharge, PaymentError>;
}

/// Configuration for the card processor API.
#[derive(Debug, Clone)]
pub struct CardGatewayConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

impl CardGatewayConfig {
    /// Build from `FUNDFLOW_CARD_URL` / `FUNDFLOW_CARD_KEY`. Returns `None`
    /// when the URL is unset.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("FUNDFLOW_CARD_URL").ok()?;
        let api_key = std::env::var("FUNDFLOW_CARD_KEY").unwrap_or_default();
        Some(Self {
            base_url,
            api_key: SecretString::from(api_key),
        })
    }
}

/// HTTP card gateway.
pub struct HttpCardGateway {
    config: CardGatewayConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChargeRequest<'a> {
    user_id: &'a str,
    amount: Decimal,
    card_number: &'a str,
    exp_month: u32,
    exp_year: i32,
    cvc: &'a str,
    cardholder: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    charge_id: Uuid,
    status: String,
    #[serde(default)]
    decline_reason: Option<String>,
}

impl HttpCardGateway {
    pub fn new(config: CardGatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CardGateway for HttpCardGateway {
    async fn create_charge(
        &self,
        user_id: &str,
        amount: Decimal,
        card: &CardDetails,
    ) -> Result<CardCharge, PaymentError> {
        let resp = self
            .client
            .post(format!("{}/v1/charges", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&ChargeRequest {
                user_id,
                amount,
                card_number: &card.number,
                exp_month: card.exp_month,
                exp_year: card.exp_year,
                cvc: &card.cvc,
                cardholder: &card.cardholder,
            })
            .send()
            .await
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::RequestFailed(format!("{status}: {body}")));
        }

        let parsed: ChargeResponse = resp
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        if parsed.status != "succeeded" {
            return Err(PaymentError::ChargeDeclined {
                reason: parsed
                    .decline_reason
                    .unwrap_or_else(|| parsed.status.clone()),
            });
        }

        Ok(CardCharge {
            charge_id: parsed.charge_id,
            amount,
            settled_at: Utc::now(),
        })
    }
}

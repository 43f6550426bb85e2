//! Bank link — initiates an account-to-account transfer.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PaymentError;

/// An initiated bank transfer. The user finishes authorization in the
/// provider's hosted page; funds land asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransfer {
    pub transfer_id: Uuid,
    /// Hosted authorization page for the host UI to open.
    pub authorization_url: String,
    pub amount: Decimal,
}

/// Provider contract for bank transfers.
#[async_trait]
pub trait BankLink: Send + Sync {
    /// Initiate a transfer of `amount` from the user's linked account.
    async fn initiate_transfer(
        &self,
        user_id: &str,
        amount: Decimal,
    ) -> Result<BankTransfer, PaymentError>;
}

/// Configuration for the bank transfer provider API.
#[derive(Debug, Clone)]
pub struct BankLinkConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

impl BankLinkConfig {
    /// Build from `FUNDFLOW_BANK_URL` / `FUNDFLOW_BANK_KEY`. Returns `None`
    /// when the URL is unset.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("FUNDFLOW_BANK_URL").ok()?;
        let api_key = std::env::var("FUNDFLOW_BANK_KEY").unwrap_or_default();
        Some(Self {
            base_url,
            api_key: SecretString::from(api_key),
        })
    }
}

/// HTTP bank link provider.
pub struct HttpBankLink {
    config: BankLinkConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    user_id: &'a str,
    amount: Decimal,
}

impl HttpBankLink {
    pub fn new(config: BankLinkConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BankLink for HttpBankLink {
    async fn initiate_transfer(
        &self,
        user_id: &str,
        amount: Decimal,
    ) -> Result<BankTransfer, PaymentError> {
        let resp = self
            .client
            .post(format!("{}/v1/bank-transfers", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&TransferRequest { user_id, amount })
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

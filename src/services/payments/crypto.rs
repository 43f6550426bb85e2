//! Crypto gateway — invoice creation and out-of-band status polling.
//!
//! A crypto contribution closes the flow as soon as the user confirms they
//! will pay the invoice; settlement is watched by a background poll task
//! that outlives the payment screen.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PaymentError;

/// Settlement state of a crypto invoice, as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CryptoPaymentStatus {
    /// Invoice created, no funds seen yet.
    Waiting,
    /// Funds seen on-chain, awaiting confirmations.
    Confirming,
    /// Fully confirmed and credited.
    Finished,
    /// Invoice lapsed before payment.
    Expired,
    /// Processor rejected or lost the payment.
    Failed,
}

impl CryptoPaymentStatus {
    /// Whether the poll task can stop watching.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Expired | Self::Failed)
    }
}

impl std::fmt::Display for CryptoPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Confirming => "confirming",
            Self::Finished => "finished",
            Self::Expired => "expired",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A crypto invoice the user pays out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoInvoice {
    pub payment_id: Uuid,
    /// Deposit address for the pay currency.
    pub address: String,
    /// Exact amount to send, denominated in `pay_currency`.
    pub pay_amount: Decimal,
    pub pay_currency: String,
}

/// A status observation from the poll task.
#[derive(Debug, Clone, Copy)]
pub struct CryptoPaymentUpdate {
    pub payment_id: Uuid,
    pub status: CryptoPaymentStatus,
}

/// Processor contract for crypto invoices.
#[async_trait]
pub trait CryptoGateway: Send + Sync {
    /// Create an invoice for `amount` (account currency), payable in
    /// `pay_currency`.
    async fn create_invoice(
        &self,
        user_id: &str,
        amount: Decimal,
        pay_currency: &str,
    ) -> Result<CryptoInvoice, PaymentError>;

    /// Fetch the current settlement status of an invoice.
    async fn payment_status(&self, payment_id: Uuid)
    -> Result<CryptoPaymentStatus, PaymentError>;
}

/// Spawn a background task that polls an invoice until it reaches a
/// terminal status or the attempt budget runs out. Status changes are sent
/// over `updates`; the receiver going away stops the task.
pub fn spawn_status_poll(
    gateway: Arc<dyn CryptoGateway>,
    payment_id: Uuid,
    interval: Duration,
    max_attempts: u32,
    updates: mpsc::UnboundedSender<CryptoPaymentUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the first poll waits
        // one full interval after invoice creation.
        ticker.tick().await;

        let mut last_seen: Option<CryptoPaymentStatus> = None;
        for attempt in 1..=max_attempts {
            ticker.tick().await;

            let status = match gateway.payment_status(payment_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(%payment_id, attempt, "Crypto status poll failed: {e}");
                    continue;
                }
            };

            if last_seen != Some(status) {
                last_seen = Some(status);
                debug!(%payment_id, %status, "Crypto payment status changed");
                if updates
                    .send(CryptoPaymentUpdate { payment_id, status })
                    .is_err()
                {
                    return;
                }
            }

            if status.is_terminal() {
                return;
            }
        }
        warn!(%payment_id, max_attempts, "Crypto status poll gave up");
    })
}

/// Configuration for the crypto processor API.
#[derive(Debug, Clone)]
pub struct CryptoGatewayConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

impl CryptoGatewayConfig {
    /// Build from `FUNDFLOW_CRYPTO_URL` / `FUNDFLOW_CRYPTO_KEY`. Returns
    /// `None` when the URL is unset.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("FUNDFLOW_CRYPTO_URL").ok()?;
        let api_key = std::env::var("FUNDFLOW_CRYPTO_KEY").unwrap_or_default();
        Some(Self {
            base_url,
            api_key: SecretString::from(api_key),
        })
    }
}

/// HTTP crypto gateway.
pub struct HttpCryptoGateway {
    config: CryptoGatewayConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct InvoiceRequest<'a> {
    user_id: &'a str,
    amount: Decimal,
    pay_currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: CryptoPaymentStatus,
}

impl HttpCryptoGateway {
    pub fn new(config: CryptoGatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CryptoGateway for HttpCryptoGateway {
    async fn create_invoice(
        &self,
        user_id: &str,
        amount: Decimal,
        pay_currency: &str,
    ) -> Result<CryptoInvoice, PaymentError> {
        let resp = self
            .client
            .post(format!("{}/v1/crypto/invoices", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&InvoiceRequest {
                user_id,
                amount,
                pay_currency,
            })
            .send()
            .await
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(PaymentError::UnsupportedCurrency {
                currency: pay_currency.to_string(),
            });
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::RequestFailed(format!("{status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }

    async fn payment_status(
        &self,
        payment_id: Uuid,
    ) -> Result<CryptoPaymentStatus, PaymentError> {
        let resp = self
            .client
            .get(format!(
                "{}/v1/crypto/invoices/{payment_id}",
                self.config.base_url
            ))
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::RequestFailed(format!("{status}: {body}")));
        }

        let parsed: StatusResponse = resp
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        Ok(parsed.status)
    }
}

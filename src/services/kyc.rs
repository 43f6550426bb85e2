//! KYC service — identity verification sessions and override records.
//!
//! Verification itself happens in the provider's hosted page, embedded by
//! the host UI. This crate only starts sessions, receives the completion
//! signal the host forwards, and records availability overrides when the
//! countdown elapses first.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::KycError;

/// A started verification session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycSession {
    pub session_id: Uuid,
    /// URL of the provider's hosted verification page; the host embeds it.
    pub session_url: String,
}

/// Provider contract for identity verification.
#[async_trait]
pub trait KycService: Send + Sync {
    /// Open a verification session for a user.
    async fn start_session(&self, user_id: &str) -> Result<KycSession, KycError>;

    /// Write an override compliance record: the user was admitted without a
    /// completed verification because the countdown elapsed. One record per
    /// override, keyed by session.
    async fn record_override(
        &self,
        user_id: &str,
        session_id: Uuid,
        reason: &str,
    ) -> Result<(), KycError>;
}

/// Configuration for the verification provider API.
#[derive(Debug, Clone)]
pub struct KycConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

impl KycConfig {
    /// Build from `FUNDFLOW_KYC_URL` / `FUNDFLOW_KYC_KEY`. Returns `None`
    /// when the URL is unset.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("FUNDFLOW_KYC_URL").ok()?;
        let api_key = std::env::var("FUNDFLOW_KYC_KEY").unwrap_or_default();
        Some(Self {
            base_url,
            api_key: SecretString::from(api_key),
        })
    }
}

/// HTTP KYC service against the verification provider.
pub struct HttpKycService {
    config: KycConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct StartSessionRequest<'a> {
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    session_id: Uuid,
    session_url: String,
}

#[derive(Debug, Serialize)]
struct OverrideRequest<'a> {
    user_id: &'a str,
    session_id: Uuid,
    reason: &'a str,
}

impl HttpKycService {
    pub fn new(config: KycConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl KycService for HttpKycService {
    async fn start_session(&self, user_id: &str) -> Result<KycSession, KycError> {
        let resp = self
            .client
            .post(format!("{}/v1/kyc/sessions", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&StartSessionRequest { user_id })
            .send()
            .await
            .map_err(|e| KycError::SessionStartFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(KycError::SessionStartFailed(format!("{status}: {body}")));
        }

        let parsed: StartSessionResponse = resp
            .json()
            .await
            .map_err(|e| KycError::InvalidResponse(e.to_string()))?;

        Ok(KycSession {
            session_id: parsed.session_id,
            session_url: parsed.session_url,
        })
    }

    async fn record_override(
        &self,
        user_id: &str,
        session_id: Uuid,
        reason: &str,
    ) -> Result<(), KycError> {
        let resp = self
            .client
            .post(format!("{}/v1/kyc/overrides", self.config.base_url))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&OverrideRequest {
                user_id,
                session_id,
                reason,
            })
            .send()
            .await
            .map_err(|e| KycError::OverrideFailed {
                session_id,
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(KycError::OverrideFailed {
                session_id,
                reason: format!("{status}: {body}"),
            });
        }
        Ok(())
    }
}

//! User onboarding status — the snapshot the controller branches on.
//!
//! Status is owned by the platform backend. The controller only ever sees
//! immutable snapshots returned per query and triggers flag mutations as a
//! side effect of screen completions; it never caches a copy of its own.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// Verification standing of the user, as reported by the compliance backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Unverified,
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    /// Whether this standing admits the user to the funding form.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

impl std::fmt::Display for KycStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unverified => "unverified",
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

/// Immutable onboarding snapshot for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingStatus {
    /// All subscription documents have been signed and recorded.
    pub documents_completed: bool,
    /// Current verification standing.
    pub kyc_status: KycStatus,
}

impl OnboardingStatus {
    /// A brand-new user: nothing signed, nothing verified.
    pub fn new_user() -> Self {
        Self {
            documents_completed: false,
            kyc_status: KycStatus::Unverified,
        }
    }
}

/// Backend contract for onboarding status and account balance.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Fetch the current onboarding snapshot for a user.
    async fn status(&self, user_id: &str) -> Result<OnboardingStatus, StatusError>;

    /// Record that the user has completed all subscription documents.
    async fn mark_documents_completed(&self, user_id: &str) -> Result<(), StatusError>;

    /// Record that the user passed identity verification.
    async fn mark_kyc_verified(&self, user_id: &str) -> Result<(), StatusError>;

    /// Fetch the user's current account balance.
    async fn balance(&self, user_id: &str) -> Result<Decimal, StatusError>;
}

/// Configuration for the platform status API.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Base URL of the platform backend, without a trailing slash.
    pub base_url: String,
    /// Bearer token for the backend API.
    pub api_key: SecretString,
}

impl PlatformConfig {
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

/// HTTP status provider backed by the platform onboarding API.
pub struct HttpStatusProvider {
    config: PlatformConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    documents_completed: bool,
    kyc_status: KycStatus,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Decimal,
}

impl HttpStatusProvider {
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    fn bearer(&self) -> &str {
        self.config.api_key.expose_secret()
    }
}

#[async_trait]
impl StatusProvider for HttpStatusProvider {
    async fn status(&self, user_id: &str) -> Result<OnboardingStatus, StatusError> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/users/{user_id}/onboarding")))
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| StatusError::RequestFailed(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StatusError::UnknownUser {
                user_id: user_id.to_string(),
            });
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StatusError::RequestFailed(format!("{status}: {body}")));
        }

        let parsed: StatusResponse = resp
            .json()
            .await
            .map_err(|e| StatusError::InvalidResponse(e.to_string()))?;

        Ok(OnboardingStatus {
            documents_completed: parsed.documents_completed,
            kyc_status: parsed.kyc_status,
        })
    }

    async fn mark_documents_completed(&self, user_id: &str) -> Result<(), StatusError> {
        self.post_flag(user_id, "documents-completed").await
    }

    async fn mark_kyc_verified(&self, user_id: &str) -> Result<(), StatusError> {
        self.post_flag(user_id, "kyc-verified").await
    }

    async fn balance(&self, user_id: &str) -> Result<Decimal, StatusError> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/accounts/{user_id}/balance")))
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| StatusError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StatusError::RequestFailed(format!("{status}: {body}")));
        }

        let parsed: BalanceResponse = resp
            .json()
            .await
            .map_err(|e| StatusError::InvalidResponse(e.to_string()))?;
        Ok(parsed.balance)
    }
}

impl HttpStatusProvider {
    /// POST an onboarding completion flag. Flag writes are idempotent on the
    /// backend, so repeating one is safe.
    async fn post_flag(&self, user_id: &str, flag: &str) -> Result<(), StatusError> {
        let resp = self
            .client
            .post(self.url(&format!("/v1/users/{user_id}/{flag}")))
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| StatusError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StatusError::RequestFailed(format!("{status}: {body}")));
        }
        Ok(())
    }
}

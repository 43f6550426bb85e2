//! Document service — persists signed subscription documents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DocumentError;

/// A signed document ready for persistence. The controller treats this as
/// an opaque payload; its contents come from the signing screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedDocumentRecord {
    pub record_id: Uuid,
    /// Document identifier within the subscription packet, e.g.
    /// "subscription_agreement".
    pub doc_id: String,
    /// Typed signature exactly as entered.
    pub signature: String,
    /// Questionnaire answers captured alongside the signature.
    pub answers: serde_json::Value,
    pub signed_at: DateTime<Utc>,
}

impl SignedDocumentRecord {
    pub fn new(doc_id: impl Into<String>, signature: impl Into<String>, answers: serde_json::Value) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            doc_id: doc_id.into(),
            signature: signature.into(),
            answers,
            signed_at: Utc::now(),
        }
    }
}

/// Backend contract for persisting signed documents.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Persist one signed document record. Writes are idempotent per
    /// `record_id`, so a retried save cannot duplicate.
    async fn save_signed_document(
        &self,
        user_id: &str,
        record: &SignedDocumentRecord,
    ) -> Result<(), DocumentError>;
}

/// Configuration for the platform document API.
#[derive(Debug, Clone)]
pub struct DocumentServiceConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

impl DocumentServiceConfig {
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

/// HTTP document service backed by the platform API.
pub struct HttpDocumentService {
    config: DocumentServiceConfig,
    client: reqwest::Client,
}

impl HttpDocumentService {
    pub fn new(config: DocumentServiceConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    async fn save_signed_document(
        &self,
        user_id: &str,
        record: &SignedDocumentRecord,
    ) -> Result<(), DocumentError> {
        let url = format!(
            "{}/v1/users/{user_id}/documents/{}",
            self.config.base_url, record.doc_id
        );

        let resp = self
            .client
            .put(url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(record)
            .send()
            .await
            .map_err(|e| DocumentError::SaveFailed {
                doc_id: record.doc_id.clone(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DocumentError::SaveFailed {
                doc_id: record.doc_id.clone(),
                reason: format!("{status}: {body}"),
            });
        }
        Ok(())
    }
}

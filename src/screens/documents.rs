//! Document signing screen — investor questionnaire and signature capture.
//!
//! The screen collects Exhibits A–D of the subscription packet plus a typed
//! signature. Validation is purely client-side; nothing is sent to the
//! backend until the submission passes.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ValidationError;
use crate::services::documents::SignedDocumentRecord;

/// Exhibit A — investor identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExhibitA {
    pub legal_name: String,
    pub mailing_address: String,
    pub tax_id: String,
}

impl ExhibitA {
    fn missing(&self) -> Option<&'static str> {
        if self.legal_name.trim().is_empty() {
            Some("legal name")
        } else if self.mailing_address.trim().is_empty() {
            Some("mailing address")
        } else if self.tax_id.trim().is_empty() {
            Some("tax id")
        } else {
            None
        }
    }
}

/// Exhibit B — accreditation basis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExhibitB {
    /// Which accreditation categories the investor claims, if any.
    pub accreditation_basis: Vec<String>,
    /// Explicit confirmation that at least one basis applies.
    pub confirmed: bool,
}

impl ExhibitB {
    fn missing(&self) -> Option<&'static str> {
        if self.accreditation_basis.is_empty() {
            Some("accreditation basis")
        } else if !self.confirmed {
            Some("confirmation")
        } else {
            None
        }
    }
}

/// Exhibit C — source of funds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExhibitC {
    pub source_of_funds: String,
    pub expected_contribution_range: String,
}

impl ExhibitC {
    fn missing(&self) -> Option<&'static str> {
        if self.source_of_funds.trim().is_empty() {
            Some("source of funds")
        } else if self.expected_contribution_range.trim().is_empty() {
            Some("expected contribution range")
        } else {
            None
        }
    }
}

/// Exhibit D — risk acknowledgements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExhibitD {
    pub acknowledges_illiquidity: bool,
    pub acknowledges_loss_risk: bool,
    pub acknowledges_no_guarantee: bool,
}

impl ExhibitD {
    fn missing(&self) -> Option<&'static str> {
        if !self.acknowledges_illiquidity {
            Some("illiquidity acknowledgement")
        } else if !self.acknowledges_loss_risk {
            Some("loss risk acknowledgement")
        } else if !self.acknowledges_no_guarantee {
            Some("no-guarantee acknowledgement")
        } else {
            None
        }
    }
}

/// Everything the signing screen submits at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSubmission {
    pub exhibit_a: ExhibitA,
    pub exhibit_b: ExhibitB,
    pub exhibit_c: ExhibitC,
    pub exhibit_d: ExhibitD,
    /// Typed signature; must be non-empty.
    pub signature: String,
}

impl DocumentSubmission {
    /// Validate the whole packet. The first missing piece is reported; the
    /// screen stays active and no backend call is made.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let exhibits: [(char, Option<&'static str>); 4] = [
            ('A', self.exhibit_a.missing()),
            ('B', self.exhibit_b.missing()),
            ('C', self.exhibit_c.missing()),
            ('D', self.exhibit_d.missing()),
        ];
        for (exhibit, missing) in exhibits {
            if let Some(missing) = missing {
                return Err(ValidationError::IncompleteExhibit {
                    exhibit,
                    missing: missing.to_string(),
                });
            }
        }
        if self.signature.trim().is_empty() {
            return Err(ValidationError::MissingSignature);
        }
        Ok(())
    }

    /// Turn a validated submission into the records the backend stores:
    /// the signed subscription agreement plus one record per exhibit.
    pub fn into_records(self) -> Vec<SignedDocumentRecord> {
        let signature = self.signature.clone();
        vec![
            SignedDocumentRecord::new(
                "subscription_agreement",
                signature.clone(),
                json!({ "signed": true }),
            ),
            SignedDocumentRecord::new(
                "exhibit_a",
                signature.clone(),
                serde_json::to_value(&self.exhibit_a).unwrap_or_default(),
            ),
            SignedDocumentRecord::new(
                "exhibit_b",
                signature.clone(),
                serde_json::to_value(&self.exhibit_b).unwrap_or_default(),
            ),
            SignedDocumentRecord::new(
                "exhibit_c",
                signature.clone(),
                serde_json::to_value(&self.exhibit_c).unwrap_or_default(),
            ),
            SignedDocumentRecord::new(
                "exhibit_d",
                signature,
                serde_json::to_value(&self.exhibit_d).unwrap_or_default(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_submission() -> DocumentSubmission {
        DocumentSubmission {
            exhibit_a: ExhibitA {
                legal_name: "Jane Investor".into(),
                mailing_address: "1 Fund St".into(),
                tax_id: "12-3456789".into(),
            },
            exhibit_b: ExhibitB {
                accreditation_basis: vec!["net_worth".into()],
                confirmed: true,
            },
            exhibit_c: ExhibitC {
                source_of_funds: "employment income".into(),
                expected_contribution_range: "10k-50k".into(),
            },
            exhibit_d: ExhibitD {
                acknowledges_illiquidity: true,
                acknowledges_loss_risk: true,
                acknowledges_no_guarantee: true,
            },
            signature: "Jane Investor".into(),
        }
    }

    #[test]
    fn complete_submission_validates() {
        assert!(complete_submission().validate().is_ok());
    }

    #[test]
    fn missing_signature_is_rejected() {
        let mut submission = complete_submission();
        submission.signature = "   ".into();
        assert_eq!(
            submission.validate(),
            Err(ValidationError::MissingSignature)
        );
    }

    #[test]
    fn incomplete_exhibit_names_the_exhibit() {
        let mut submission = complete_submission();
        submission.exhibit_b.confirmed = false;
        match submission.validate() {
            Err(ValidationError::IncompleteExhibit { exhibit, .. }) => {
                assert_eq!(exhibit, 'B');
            }
            other => panic!("expected incomplete exhibit B, got {other:?}"),
        }
    }

    #[test]
    fn unchecked_acknowledgement_is_rejected() {
        let mut submission = complete_submission();
        submission.exhibit_d.acknowledges_loss_risk = false;
        match submission.validate() {
            Err(ValidationError::IncompleteExhibit { exhibit, missing }) => {
                assert_eq!(exhibit, 'D');
                assert!(missing.contains("loss risk"));
            }
            other => panic!("expected incomplete exhibit D, got {other:?}"),
        }
    }

    #[test]
    fn records_cover_agreement_and_every_exhibit() {
        let records = complete_submission().into_records();
        let ids: Vec<&str> = records.iter().map(|r| r.doc_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "subscription_agreement",
                "exhibit_a",
                "exhibit_b",
                "exhibit_c",
                "exhibit_d"
            ]
        );
        assert!(records.iter().all(|r| r.signature == "Jane Investor"));
    }
}

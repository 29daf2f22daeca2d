//! License conclusions and bulk conclusions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A curator's license decision for one file content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseConclusion {
    pub id: i64,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    pub concluded_license_expression_spdx: String,
    #[serde(rename = "detectedLicenseExpressionSPDX")]
    pub detected_license_expression_spdx: Option<String>,
    pub comment: Option<String>,
    /// Only applies in the context package
    pub local: bool,
    pub context_purl: String,
    pub file_sha256: String,
    pub user_id: i64,
    pub bulk_conclusion_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a license conclusion before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewLicenseConclusion {
    pub concluded_license_expression_spdx: String,
    pub detected_license_expression_spdx: Option<String>,
    pub comment: Option<String>,
    pub local: bool,
    pub context_purl: String,
    pub file_sha256: String,
    pub user_id: i64,
    pub bulk_conclusion_id: Option<i64>,
}

/// Partial update of a license conclusion.
///
/// `None` leaves a field unchanged; for nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseConclusionChanges {
    pub concluded_license_expression_spdx: Option<String>,
    pub detected_license_expression_spdx: Option<Option<String>>,
    pub comment: Option<Option<String>>,
    pub local: Option<bool>,
}

impl LicenseConclusionChanges {
    /// Whether no field would change
    pub fn is_empty(&self) -> bool {
        self.concluded_license_expression_spdx.is_none()
            && self.detected_license_expression_spdx.is_none()
            && self.comment.is_none()
            && self.local.is_none()
    }

    /// Apply the changes in place
    pub fn apply(&self, conclusion: &mut LicenseConclusion, now: DateTime<Utc>) {
        if let Some(concluded) = &self.concluded_license_expression_spdx {
            conclusion.concluded_license_expression_spdx = concluded.clone();
        }
        if let Some(detected) = &self.detected_license_expression_spdx {
            conclusion.detected_license_expression_spdx = detected.clone();
        }
        if let Some(comment) = &self.comment {
            conclusion.comment = comment.clone();
        }
        if let Some(local) = self.local {
            conclusion.local = local;
        }
        conclusion.updated_at = now;
    }
}

/// A license decision applied to every file matched by a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkConclusion {
    pub id: i64,
    pub pattern: String,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    pub concluded_license_expression_spdx: String,
    #[serde(rename = "detectedLicenseExpressionSPDX")]
    pub detected_license_expression_spdx: Option<String>,
    pub comment: Option<String>,
    pub local: bool,
    pub context_purl: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkConclusion {
    /// Conclusion generated by this bulk conclusion for one file content
    pub fn conclusion_for(&self, file_sha256: &str) -> NewLicenseConclusion {
        NewLicenseConclusion {
            concluded_license_expression_spdx: self.concluded_license_expression_spdx.clone(),
            detected_license_expression_spdx: self.detected_license_expression_spdx.clone(),
            comment: self.comment.clone(),
            local: self.local,
            context_purl: self.context_purl.clone(),
            file_sha256: file_sha256.to_string(),
            user_id: self.user_id,
            bulk_conclusion_id: Some(self.id),
        }
    }
}

/// Fields of a bulk conclusion before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewBulkConclusion {
    pub pattern: String,
    pub concluded_license_expression_spdx: String,
    pub detected_license_expression_spdx: Option<String>,
    pub comment: Option<String>,
    pub local: bool,
    pub context_purl: String,
    pub user_id: i64,
}

/// Partial update of a bulk conclusion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkConclusionChanges {
    pub pattern: Option<String>,
    pub concluded_license_expression_spdx: Option<String>,
    pub detected_license_expression_spdx: Option<Option<String>>,
    pub comment: Option<Option<String>>,
    pub local: Option<bool>,
}

impl BulkConclusionChanges {
    /// Whether no field would change
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none() && self.conclusion_changes().is_empty()
    }

    /// The subset of changes that is copied onto owned license conclusions
    pub fn conclusion_changes(&self) -> LicenseConclusionChanges {
        LicenseConclusionChanges {
            concluded_license_expression_spdx: self.concluded_license_expression_spdx.clone(),
            detected_license_expression_spdx: self.detected_license_expression_spdx.clone(),
            comment: self.comment.clone(),
            local: self.local,
        }
    }

    /// Apply the changes in place
    pub fn apply(&self, bulk: &mut BulkConclusion, now: DateTime<Utc>) {
        if let Some(pattern) = &self.pattern {
            bulk.pattern = pattern.clone();
        }
        if let Some(concluded) = &self.concluded_license_expression_spdx {
            bulk.concluded_license_expression_spdx = concluded.clone();
        }
        if let Some(detected) = &self.detected_license_expression_spdx {
            bulk.detected_license_expression_spdx = detected.clone();
        }
        if let Some(comment) = &self.comment {
            bulk.comment = comment.clone();
        }
        if let Some(local) = self.local {
            bulk.local = local;
        }
        bulk.updated_at = now;
    }
}

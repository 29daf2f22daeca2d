//! License conclusion, bulk conclusion and path exclusion contracts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use clearance_domain::{
    entities::{
        BulkConclusion, BulkConclusionChanges, LicenseConclusion, LicenseConclusionChanges,
        PathExclusion, PathExclusionChanges, PathExclusionReason,
    },
    services::{AdditionalMatch, AffectedFiles, BulkUpdated},
};

use super::UserRef;
use crate::{
    error::{ApiError, ApiResult},
    extract::{double_option, non_null},
};

fn nothing_to_update() -> ApiError {
    ApiError::bad_request("at least one field must be given")
}

/// A license conclusion as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseConclusionDto {
    pub id: i64,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    pub concluded_license_expression_spdx: String,
    #[serde(rename = "detectedLicenseExpressionSPDX")]
    pub detected_license_expression_spdx: Option<String>,
    pub comment: Option<String>,
    pub local: bool,
    pub context_purl: String,
    pub file_sha256: String,
    pub user: UserRef,
    /// Set when the conclusion was made by a bulk conclusion
    pub bulk_conclusion_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LicenseConclusionDto {
    pub fn new(conclusion: LicenseConclusion, username: String) -> Self {
        Self {
            id: conclusion.id,
            concluded_license_expression_spdx: conclusion.concluded_license_expression_spdx,
            detected_license_expression_spdx: conclusion.detected_license_expression_spdx,
            comment: conclusion.comment,
            local: conclusion.local,
            context_purl: conclusion.context_purl,
            file_sha256: conclusion.file_sha256,
            user: UserRef { username },
            bulk_conclusion_id: conclusion.bulk_conclusion_id,
            created_at: conclusion.created_at,
            updated_at: conclusion.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseConclusionListResponse {
    pub license_conclusions: Vec<LicenseConclusionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseConclusionResponse {
    pub license_conclusion: LicenseConclusionDto,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLicenseConclusionRequest {
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    pub concluded_license_expression_spdx: String,
    #[serde(rename = "detectedLicenseExpressionSPDX", default)]
    pub detected_license_expression_spdx: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Only apply in the context package (default `false`)
    #[serde(default, deserialize_with = "non_null")]
    pub local: Option<bool>,
    pub context_purl: String,
    pub file_sha256: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLicenseConclusionRequest {
    #[serde(
        rename = "concludedLicenseExpressionSPDX",
        default,
        deserialize_with = "non_null"
    )]
    pub concluded_license_expression_spdx: Option<String>,
    #[serde(
        rename = "detectedLicenseExpressionSPDX",
        default,
        deserialize_with = "double_option"
    )]
    #[schema(value_type = Option<String>)]
    pub detected_license_expression_spdx: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub comment: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null")]
    pub local: Option<bool>,
}

impl UpdateLicenseConclusionRequest {
    pub fn into_changes(self) -> ApiResult<LicenseConclusionChanges> {
        let changes = LicenseConclusionChanges {
            concluded_license_expression_spdx: self.concluded_license_expression_spdx,
            detected_license_expression_spdx: self.detected_license_expression_spdx,
            comment: self.comment,
            local: self.local,
        };
        if changes.is_empty() {
            return Err(nothing_to_update());
        }
        Ok(changes)
    }
}

/// A bulk conclusion as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkConclusionDto {
    pub id: i64,
    pub pattern: String,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    pub concluded_license_expression_spdx: String,
    #[serde(rename = "detectedLicenseExpressionSPDX")]
    pub detected_license_expression_spdx: Option<String>,
    pub comment: Option<String>,
    pub local: bool,
    pub context_purl: String,
    pub user: UserRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkConclusionDto {
    pub fn new(bulk: BulkConclusion, username: String) -> Self {
        Self {
            id: bulk.id,
            pattern: bulk.pattern,
            concluded_license_expression_spdx: bulk.concluded_license_expression_spdx,
            detected_license_expression_spdx: bulk.detected_license_expression_spdx,
            comment: bulk.comment,
            local: bulk.local,
            context_purl: bulk.context_purl,
            user: UserRef { username },
            created_at: bulk.created_at,
            updated_at: bulk.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkConclusionListResponse {
    pub bulk_conclusions: Vec<BulkConclusionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkConclusionResponse {
    pub bulk_conclusion: BulkConclusionDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdditionalMatchDto {
    pub path: String,
    pub purl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AffectedFilesDto {
    /// Matched paths of the context package
    pub in_context_purl: Vec<String>,
    /// Paths of other packages with content concluded by the bulk conclusion
    pub additional_matches: Vec<AdditionalMatchDto>,
}

impl From<AffectedFiles> for AffectedFilesDto {
    fn from(affected: AffectedFiles) -> Self {
        Self {
            in_context_purl: affected.in_context_purl,
            additional_matches: affected
                .additional_matches
                .into_iter()
                .map(|AdditionalMatch { purl, path }| AdditionalMatchDto { path, purl })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AffectedFilesResponse {
    pub affected_files: AffectedFilesDto,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PreviewRequest {
    pub pattern: String,
    pub purl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub matched_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBulkConclusionRequest {
    /// Glob matched against the context package's file tree
    pub pattern: String,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    pub concluded_license_expression_spdx: String,
    #[serde(rename = "detectedLicenseExpressionSPDX", default)]
    pub detected_license_expression_spdx: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub local: Option<bool>,
    pub context_purl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreatedResponse {
    pub bulk_conclusion_id: i64,
    pub matched_paths_count: usize,
    pub added_license_conclusions_count: usize,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBulkConclusionRequest {
    #[serde(default, deserialize_with = "non_null")]
    pub pattern: Option<String>,
    #[serde(
        rename = "concludedLicenseExpressionSPDX",
        default,
        deserialize_with = "non_null"
    )]
    pub concluded_license_expression_spdx: Option<String>,
    #[serde(
        rename = "detectedLicenseExpressionSPDX",
        default,
        deserialize_with = "double_option"
    )]
    #[schema(value_type = Option<String>)]
    pub detected_license_expression_spdx: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub comment: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null")]
    pub local: Option<bool>,
}

impl UpdateBulkConclusionRequest {
    pub fn into_changes(self) -> ApiResult<BulkConclusionChanges> {
        let changes = BulkConclusionChanges {
            pattern: self.pattern,
            concluded_license_expression_spdx: self.concluded_license_expression_spdx,
            detected_license_expression_spdx: self.detected_license_expression_spdx,
            comment: self.comment,
            local: self.local,
        };
        if changes.is_empty() {
            return Err(nothing_to_update());
        }
        Ok(changes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdatedResponse {
    pub message: String,
    pub matched_paths_count: usize,
    pub added_license_conclusions_count: usize,
    pub deleted_license_conclusions_count: usize,
}

impl From<BulkUpdated> for BulkUpdatedResponse {
    fn from(updated: BulkUpdated) -> Self {
        Self {
            message: "Bulk conclusion updated".to_string(),
            matched_paths_count: updated.matched_paths_count,
            added_license_conclusions_count: updated.added_license_conclusions_count,
            deleted_license_conclusions_count: updated.deleted_license_conclusions_count,
        }
    }
}

/// A path exclusion as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PathExclusionDto {
    pub id: i64,
    pub purl: String,
    pub pattern: String,
    #[schema(value_type = String, example = "TEST_OF")]
    pub reason: PathExclusionReason,
    pub comment: Option<String>,
    pub user: UserRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PathExclusionDto {
    pub fn new(exclusion: PathExclusion, username: String) -> Self {
        Self {
            id: exclusion.id,
            purl: exclusion.purl,
            pattern: exclusion.pattern,
            reason: exclusion.reason,
            comment: exclusion.comment,
            user: UserRef { username },
            created_at: exclusion.created_at,
            updated_at: exclusion.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PathExclusionListResponse {
    pub path_exclusions: Vec<PathExclusionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PathExclusionResponse {
    pub path_exclusion: PathExclusionDto,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePathExclusionRequest {
    pub purl: String,
    pub pattern: String,
    #[schema(value_type = String, example = "TEST_OF")]
    pub reason: PathExclusionReason,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePathExclusionRequest {
    #[serde(default, deserialize_with = "non_null")]
    pub pattern: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    #[schema(value_type = Option<String>, example = "TEST_OF")]
    pub reason: Option<PathExclusionReason>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub comment: Option<Option<String>>,
}

impl UpdatePathExclusionRequest {
    pub fn into_changes(self) -> ApiResult<PathExclusionChanges> {
        let changes = PathExclusionChanges {
            pattern: self.pattern,
            reason: self.reason,
            comment: self.comment,
        };
        if changes.is_empty() {
            return Err(nothing_to_update());
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse_json;

    #[test]
    fn test_update_requires_a_field() {
        let request: UpdateLicenseConclusionRequest = parse_json(b"{}").unwrap();
        assert!(request.into_changes().is_err());
    }

    #[test]
    fn test_update_null_clears_comment() {
        let request: UpdatePathExclusionRequest = parse_json(br#"{"comment":null}"#).unwrap();
        let changes = request.into_changes().unwrap();
        assert_eq!(changes.comment, Some(None));
        assert_eq!(changes.pattern, None);
    }

    #[test]
    fn test_update_rejects_null_pattern() {
        assert!(parse_json::<UpdateBulkConclusionRequest>(br#"{"pattern":null}"#).is_err());
    }

    #[test]
    fn test_unknown_reason_names_field() {
        let err = parse_json::<CreatePathExclusionRequest>(
            br#"{"purl":"pkg:npm/a@1","pattern":"**","reason":"VENDORED"}"#,
        )
        .unwrap_err();
        match err {
            ApiError::Validation { path, .. } => assert_eq!(path.as_deref(), Some("reason")),
            other => panic!("unexpected {:?}", other),
        }
    }
}

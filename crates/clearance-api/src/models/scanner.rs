//! Scanner job API contracts

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use clearance_domain::{
    entities::{JobStatus, ScanReport, ScannerJob},
    services::{
        ConfiguredConclusion, ConfiguredExclusion, PackageConfiguration, ResultStatus,
        ScanResults,
    },
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PurlRequest {
    pub purl: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PurlsRequest {
    /// At least one purl
    pub purls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanResultsState {
    #[schema(value_type = String, example = "ready")]
    pub status: ResultStatus,
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanResultsResponse {
    pub purls: Vec<String>,
    pub state: ScanResultsState,
    /// Licenses, copyrights and issues once the state is `ready`
    #[schema(value_type = Option<Object>)]
    pub results: Option<ScanResults>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredConclusionDto {
    pub path: String,
    #[serde(rename = "detectedLicenseExpressionSPDX")]
    pub detected_license_expression_spdx: Option<String>,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    pub concluded_license_expression_spdx: String,
    pub comment: Option<String>,
}

impl From<ConfiguredConclusion> for ConfiguredConclusionDto {
    fn from(conclusion: ConfiguredConclusion) -> Self {
        Self {
            path: conclusion.path,
            detected_license_expression_spdx: conclusion.detected_license_expression_spdx,
            concluded_license_expression_spdx: conclusion.concluded_license_expression_spdx,
            comment: conclusion.comment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfiguredExclusionDto {
    pub pattern: String,
    #[schema(value_type = String, example = "TEST_OF")]
    pub reason: clearance_domain::entities::PathExclusionReason,
    pub comment: Option<String>,
}

impl From<ConfiguredExclusion> for ConfiguredExclusionDto {
    fn from(exclusion: ConfiguredExclusion) -> Self {
        Self {
            pattern: exclusion.pattern,
            reason: exclusion.reason,
            comment: exclusion.comment,
        }
    }
}

/// Effective curation of one package
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackageConfigurationResponse {
    pub license_conclusions: Vec<ConfiguredConclusionDto>,
    pub path_exclusions: Vec<ConfiguredExclusionDto>,
}

impl From<PackageConfiguration> for PackageConfigurationResponse {
    fn from(configuration: PackageConfiguration) -> Self {
        Self {
            license_conclusions: configuration
                .license_conclusions
                .into_iter()
                .map(Into::into)
                .collect(),
            path_exclusions: configuration
                .path_exclusions
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UploadUrlRequest {
    /// Object key, letters, digits, `.`, `_` and `-`
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Query of a signed upload URL
#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadSignature {
    /// Unix time after which the URL is rejected
    pub expires: i64,
    /// Hex HMAC-SHA256 of key and expiry
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    /// Key of an uploaded `.tar.gz` archive
    pub zip_file_key: String,
    pub purls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub scanner_job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobStateDto {
    #[schema(value_type = String, example = "queued")]
    pub status: JobStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobStateResponse {
    pub id: String,
    pub state: JobStateDto,
}

impl From<ScannerJob> for JobStateResponse {
    fn from(job: ScannerJob) -> Self {
        Self {
            id: job.id,
            state: JobStateDto {
                status: job.status,
                message: job.message,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct JobStateReport {
    #[schema(value_type = String, example = "scanning")]
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct JobStateReportData {
    pub state: JobStateReport,
}

/// State report from the scanner agent
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateJobStateRequest {
    pub data: JobStateReportData,
}

/// Results delivered by the scanner agent
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResultsRequest {
    pub id: String,
    /// Queue entry on the agent that produced the results
    #[serde(default)]
    pub agent_job_id: Option<String>,
    #[schema(value_type = Object)]
    pub result: ScanReport,
}

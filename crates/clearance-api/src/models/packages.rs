//! Package, file tree and file contracts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use clearance_domain::entities::{
    CopyrightFinding, File, FileTree, LicenseFinding, Package, ScanStatus,
};

use super::LicenseConclusionDto;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackageDto {
    pub id: i64,
    pub purl: String,
    #[serde(rename = "type")]
    pub package_type: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
    pub qualifiers: Option<String>,
    pub subpath: Option<String>,
    #[schema(value_type = String, example = "scanned")]
    pub scan_status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Package> for PackageDto {
    fn from(package: Package) -> Self {
        Self {
            id: package.id,
            purl: package.purl,
            package_type: package.package_type,
            namespace: package.namespace,
            name: package.name,
            version: package.version,
            qualifiers: package.qualifiers,
            subpath: package.subpath,
            scan_status: package.scan_status,
            created_at: package.created_at,
            updated_at: package.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PackageListResponse {
    pub packages: Vec<PackageDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileTreeDto {
    pub path: String,
    pub file_sha256: String,
    pub package_id: i64,
}

impl From<FileTree> for FileTreeDto {
    fn from(entry: FileTree) -> Self {
        Self {
            path: entry.path,
            file_sha256: entry.file_sha256,
            package_id: entry.package_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileTreeListResponse {
    pub filetrees: Vec<FileTreeDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseFindingDto {
    #[serde(rename = "licenseExpressionSPDX")]
    pub license_expression_spdx: String,
    pub start_line: u32,
    pub end_line: u32,
    pub score: f64,
    pub scanner: String,
}

impl From<LicenseFinding> for LicenseFindingDto {
    fn from(finding: LicenseFinding) -> Self {
        Self {
            license_expression_spdx: finding.license_expression_spdx,
            start_line: finding.start_line,
            end_line: finding.end_line,
            score: finding.score,
            scanner: finding.scanner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CopyrightFindingDto {
    pub statement: String,
    pub start_line: u32,
    pub end_line: u32,
    pub scanner: String,
}

impl From<CopyrightFinding> for CopyrightFindingDto {
    fn from(finding: CopyrightFinding) -> Self {
        Self {
            statement: finding.statement,
            start_line: finding.start_line,
            end_line: finding.end_line,
            scanner: finding.scanner,
        }
    }
}

/// One file content with everything known about it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub sha256: String,
    #[schema(value_type = String, example = "scanned")]
    pub scan_status: ScanStatus,
    pub license_findings: Vec<LicenseFindingDto>,
    pub copyright_findings: Vec<CopyrightFindingDto>,
    pub license_conclusions: Vec<LicenseConclusionDto>,
}

impl FileDto {
    pub fn new(
        file: File,
        license_findings: Vec<LicenseFinding>,
        copyright_findings: Vec<CopyrightFinding>,
        license_conclusions: Vec<LicenseConclusionDto>,
    ) -> Self {
        Self {
            sha256: file.sha256,
            scan_status: file.scan_status,
            license_findings: license_findings.into_iter().map(Into::into).collect(),
            copyright_findings: copyright_findings.into_iter().map(Into::into).collect(),
            license_conclusions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileResponse {
    pub file: FileDto,
}

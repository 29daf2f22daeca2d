//! File content, file trees and scanner findings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::package::ScanStatus;

/// File content identified by its SHA-256 digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub sha256: String,
    pub scan_status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One path of a package's file tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTree {
    pub id: i64,
    pub path: String,
    pub package_id: i64,
    pub file_sha256: String,
}

/// License detected by a scanner in a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseFinding {
    pub id: i64,
    pub file_sha256: String,
    #[serde(rename = "licenseExpressionSPDX")]
    pub license_expression_spdx: String,
    pub start_line: u32,
    pub end_line: u32,
    pub score: f64,
    pub scanner: String,
}

/// License finding before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewLicenseFinding {
    pub license_expression_spdx: String,
    pub start_line: u32,
    pub end_line: u32,
    pub score: f64,
    pub scanner: String,
}

/// Copyright statement detected in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyrightFinding {
    pub id: i64,
    pub file_sha256: String,
    pub statement: String,
    pub start_line: u32,
    pub end_line: u32,
    pub scanner: String,
}

/// Copyright finding before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCopyrightFinding {
    pub statement: String,
    pub start_line: u32,
    pub end_line: u32,
    pub scanner: String,
}

/// Severity of a scan issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

/// Problem reported while scanning a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanIssue {
    pub id: i64,
    pub package_id: i64,
    pub severity: IssueSeverity,
    pub source: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Scan issue before it is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScanIssue {
    pub severity: IssueSeverity,
    pub source: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

//! Scanner output exchanged between the scanner agent and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::IssueSeverity;

/// Name and version of the scanner that produced a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerInfo {
    pub name: String,
    pub version: String,
}

/// License detected in a scanned file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLicense {
    #[serde(rename = "licenseExpressionSPDX")]
    pub license_expression_spdx: String,
    pub start_line: u32,
    pub end_line: u32,
    pub score: f64,
}

/// Copyright statement found in a scanned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedCopyright {
    pub statement: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// One regular file of a scanned directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedFile {
    pub path: String,
    /// `None` when the file could not be read
    pub sha256: Option<String>,
    #[serde(default)]
    pub license_findings: Vec<DetectedLicense>,
    #[serde(default)]
    pub copyright_findings: Vec<DetectedCopyright>,
}

/// Issue raised while scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedIssue {
    pub severity: IssueSeverity,
    pub source: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Full result of scanning one directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scanner: ScannerInfo,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<ScannedFile>,
    #[serde(default)]
    pub issues: Vec<ReportedIssue>,
}

impl ScanReport {
    /// Scanner label stored with each finding (`name@version`)
    pub fn scanner_label(&self) -> String {
        format!("{}@{}", self.scanner.name, self.scanner.version)
    }
}

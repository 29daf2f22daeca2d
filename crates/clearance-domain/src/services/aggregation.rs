//! Result aggregation for clients of the scanner API
//!
//! Builds the package configuration (effective license conclusions and path
//! exclusions of one package) and the scan results view.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    entities::{
        IssueSeverity, LicenseConclusion, LicenseFinding, Package, PathExclusionReason,
        ScanStatus,
    },
    errors::DomainResult,
    repositories::Repositories,
    spdx::SpdxExpression,
};

/// Effective conclusion for one path of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredConclusion {
    pub path: String,
    #[serde(rename = "detectedLicenseExpressionSPDX")]
    pub detected_license_expression_spdx: Option<String>,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    pub concluded_license_expression_spdx: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfiguredExclusion {
    pub pattern: String,
    pub reason: PathExclusionReason,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageConfiguration {
    pub license_conclusions: Vec<ConfiguredConclusion>,
    pub path_exclusions: Vec<ConfiguredExclusion>,
}

/// Where a finding was made
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseResult {
    pub license: String,
    pub location: Location,
    pub score: f64,
    pub scanner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyrightResult {
    pub statement: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueResult {
    pub severity: IssueSeverity,
    pub source: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Findings of one scanned package
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanResults {
    pub licenses: Vec<LicenseResult>,
    pub copyrights: Vec<CopyrightResult>,
    pub issues: Vec<IssueResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultStatus {
    NoResults,
    Pending,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResultsOutcome {
    pub status: ResultStatus,
    pub job_id: Option<String>,
    pub results: Option<ScanResults>,
}

#[derive(Clone)]
pub struct ResultAggregator {
    repos: Repositories,
}

impl ResultAggregator {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Effective configuration of a package; unknown packages have none
    pub async fn package_configuration(&self, purl: &str) -> DomainResult<PackageConfiguration> {
        let Some(package) = self.repos.resolve_package(purl).await? else {
            return Ok(PackageConfiguration::default());
        };

        let path_exclusions = self
            .repos
            .path_exclusions
            .for_purl(&package.purl)
            .await?
            .into_iter()
            .map(|e| ConfiguredExclusion {
                pattern: e.pattern,
                reason: e.reason,
                comment: e.comment,
            })
            .collect();

        let tree = self.repos.file_trees.for_package(package.id).await?;
        let mut contents: Vec<String> = tree.iter().map(|e| e.file_sha256.clone()).collect();
        contents.sort();
        contents.dedup();

        let mut conclusions: HashMap<String, Vec<LicenseConclusion>> = HashMap::new();
        for conclusion in self.repos.license_conclusions.for_contents(&contents).await? {
            conclusions
                .entry(conclusion.file_sha256.clone())
                .or_default()
                .push(conclusion);
        }
        let mut findings: HashMap<String, Vec<LicenseFinding>> = HashMap::new();
        for finding in self.repos.files.license_findings(&contents).await? {
            findings
                .entry(finding.file_sha256.clone())
                .or_default()
                .push(finding);
        }

        let mut license_conclusions = Vec::new();
        for entry in &tree {
            let Some(candidates) = conclusions.get(&entry.file_sha256) else {
                continue;
            };
            let Some(winner) = select_conclusion(&package.purl, candidates) else {
                continue;
            };
            let detected = winner.detected_license_expression_spdx.clone().or_else(|| {
                findings.get(&entry.file_sha256).and_then(|found| {
                    SpdxExpression::conjunction(
                        found.iter().map(|f| f.license_expression_spdx.as_str()),
                    )
                })
            });
            license_conclusions.push(ConfiguredConclusion {
                path: entry.path.clone(),
                detected_license_expression_spdx: detected,
                concluded_license_expression_spdx: winner.concluded_license_expression_spdx.clone(),
                comment: winner.comment.clone(),
            });
        }

        Ok(PackageConfiguration {
            license_conclusions,
            path_exclusions,
        })
    }

    /// Scan state and results for a set of purls
    pub async fn scan_results(&self, purls: &[String]) -> DomainResult<ScanResultsOutcome> {
        let mut packages: Vec<Option<Package>> = Vec::with_capacity(purls.len());
        for purl in purls {
            packages.push(self.repos.resolve_package(purl).await?);
        }

        let all_scanned = !packages.is_empty()
            && packages
                .iter()
                .all(|p| matches!(p, Some(p) if p.scan_status == ScanStatus::Scanned));
        if all_scanned {
            if let Some(Some(first)) = packages.first() {
                let results = self.results_for(first).await?;
                return Ok(ScanResultsOutcome {
                    status: ResultStatus::Ready,
                    job_id: None,
                    results: Some(results),
                });
            }
        }

        for package in packages.iter().flatten() {
            if let Some(job) = self.repos.jobs.active_for_package(package.id).await? {
                return Ok(ScanResultsOutcome {
                    status: ResultStatus::Pending,
                    job_id: Some(job.id),
                    results: None,
                });
            }
        }

        Ok(ScanResultsOutcome {
            status: ResultStatus::NoResults,
            job_id: None,
            results: None,
        })
    }

    /// License, copyright and issue results of one package
    pub async fn results_for(&self, package: &Package) -> DomainResult<ScanResults> {
        let tree = self.repos.file_trees.for_package(package.id).await?;
        let mut contents: Vec<String> = tree.iter().map(|e| e.file_sha256.clone()).collect();
        contents.sort();
        contents.dedup();

        let mut licenses_by_sha: HashMap<String, Vec<LicenseFinding>> = HashMap::new();
        for finding in self.repos.files.license_findings(&contents).await? {
            licenses_by_sha
                .entry(finding.file_sha256.clone())
                .or_default()
                .push(finding);
        }
        let mut copyrights_by_sha: HashMap<String, Vec<_>> = HashMap::new();
        for finding in self.repos.files.copyright_findings(&contents).await? {
            copyrights_by_sha
                .entry(finding.file_sha256.clone())
                .or_default()
                .push(finding);
        }

        let mut results = ScanResults::default();
        for entry in &tree {
            for finding in licenses_by_sha.get(&entry.file_sha256).into_iter().flatten() {
                results.licenses.push(LicenseResult {
                    license: finding.license_expression_spdx.clone(),
                    location: Location {
                        path: entry.path.clone(),
                        start_line: finding.start_line,
                        end_line: finding.end_line,
                    },
                    score: finding.score,
                    scanner: finding.scanner.clone(),
                });
            }
            for finding in copyrights_by_sha.get(&entry.file_sha256).into_iter().flatten() {
                results.copyrights.push(CopyrightResult {
                    statement: finding.statement.clone(),
                    location: Location {
                        path: entry.path.clone(),
                        start_line: finding.start_line,
                        end_line: finding.end_line,
                    },
                });
            }
        }
        results.issues = self
            .repos
            .scan_issues
            .for_package(package.id)
            .await?
            .into_iter()
            .map(|issue| IssueResult {
                severity: issue.severity,
                source: issue.source,
                message: issue.message,
                timestamp: issue.timestamp,
            })
            .collect();

        Ok(results)
    }
}

/// Pick the conclusion that applies in `purl` among those on one content.
///
/// Local conclusions only count in their own context. A conclusion made in
/// this package's context beats foreign ones; after that the most recently
/// updated wins and the highest id breaks remaining ties.
pub fn select_conclusion<'a>(
    purl: &str,
    candidates: &'a [LicenseConclusion],
) -> Option<&'a LicenseConclusion> {
    candidates
        .iter()
        .filter(|c| !c.local || c.context_purl == purl)
        .max_by_key(|c| (c.context_purl == purl, c.updated_at, c.id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn conclusion(id: i64, context: &str, local: bool, minutes: i64) -> LicenseConclusion {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        LicenseConclusion {
            id,
            concluded_license_expression_spdx: format!("LicenseRef-{}", id),
            detected_license_expression_spdx: None,
            comment: None,
            local,
            context_purl: context.to_string(),
            file_sha256: "a".repeat(64),
            user_id: 1,
            bulk_conclusion_id: None,
            created_at: base,
            updated_at: base + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_own_context_wins_over_newer_foreign() {
        let candidates = vec![
            conclusion(1, "pkg:npm/a@1", false, 0),
            conclusion(2, "pkg:npm/b@1", false, 10),
        ];
        assert_eq!(select_conclusion("pkg:npm/a@1", &candidates).unwrap().id, 1);
    }

    #[test]
    fn test_latest_foreign_wins() {
        let candidates = vec![
            conclusion(1, "pkg:npm/b@1", false, 5),
            conclusion(2, "pkg:npm/c@1", false, 1),
        ];
        assert_eq!(select_conclusion("pkg:npm/a@1", &candidates).unwrap().id, 1);
    }

    #[test]
    fn test_foreign_local_is_ignored() {
        let candidates = vec![conclusion(1, "pkg:npm/b@1", true, 0)];
        assert!(select_conclusion("pkg:npm/a@1", &candidates).is_none());
        assert!(select_conclusion("pkg:npm/b@1", &candidates).is_some());
    }

    #[test]
    fn test_id_breaks_ties() {
        let candidates = vec![
            conclusion(4, "pkg:npm/b@1", false, 0),
            conclusion(9, "pkg:npm/c@1", false, 0),
        ];
        assert_eq!(select_conclusion("pkg:npm/a@1", &candidates).unwrap().id, 9);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ResultStatus::NoResults).unwrap(),
            "\"no-results\""
        );
    }
}

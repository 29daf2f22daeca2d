//! Storing scanner reports

use std::collections::BTreeMap;

use tracing::{info, warn};

use super::{bulk::BulkConclusionService, jobs::JobService};
use crate::{
    entities::{
        JobStatus, NewCopyrightFinding, NewLicenseFinding, NewScanIssue, ScanReport, ScanStatus,
        ScannedFile,
    },
    errors::{DomainError, DomainResult},
    purl::Purl,
    repositories::Repositories,
    value_objects::{validate_tree_path, Sha256Digest},
};

#[derive(Clone)]
pub struct ScanIngestor {
    repos: Repositories,
    jobs: JobService,
    bulk: BulkConclusionService,
}

impl ScanIngestor {
    pub fn new(repos: Repositories) -> Self {
        Self {
            jobs: JobService::new(repos.clone()),
            bulk: BulkConclusionService::new(repos.clone()),
            repos,
        }
    }

    /// Save the report of a job and complete it.
    ///
    /// A report that cannot be stored fails the job and its packages.
    pub async fn save_results(&self, job_id: &str, report: &ScanReport) -> DomainResult<()> {
        let job = self.jobs.get(job_id).await?;
        match job.status {
            JobStatus::Queued => {
                self.jobs.transition(job_id, JobStatus::Scanning, None).await?;
                self.jobs.transition(job_id, JobStatus::SavingResults, None).await?;
            }
            JobStatus::Scanning => {
                self.jobs.transition(job_id, JobStatus::SavingResults, None).await?;
            }
            JobStatus::SavingResults => {}
            other => {
                return Err(DomainError::InvalidStateTransition {
                    from: other.to_string(),
                    to: JobStatus::SavingResults.to_string(),
                })
            }
        }

        if let Err(e) = self.store(&job.purls, report).await {
            warn!(job_id, error = %e, "Saving scan results failed");
            self.jobs
                .fail(job_id, format!("saving results failed: {}", e))
                .await?;
            return Err(e);
        }

        self.jobs.transition(job_id, JobStatus::Completed, None).await?;
        info!(job_id, files = report.files.len(), "Saved scan results");
        Ok(())
    }

    async fn store(&self, purls: &[String], report: &ScanReport) -> DomainResult<()> {
        let scanner = report.scanner_label();

        let mut tree = Vec::with_capacity(report.files.len());
        let mut contents: BTreeMap<String, &ScannedFile> = BTreeMap::new();
        for (i, file) in report.files.iter().enumerate() {
            validate_tree_path(&file.path)
                .map_err(|e| e.at_field(format!("result.files[{}].path", i)))?;
            let Some(sha256) = &file.sha256 else {
                continue;
            };
            let sha256 = Sha256Digest::parse(sha256)
                .map_err(|e| e.at_field(format!("result.files[{}].sha256", i)))?;
            tree.push((file.path.clone(), sha256.as_str().to_string()));
            contents.entry(sha256.into()).or_insert(file);
        }

        for (sha256, file) in &contents {
            self.repos.files.upsert(sha256, ScanStatus::Scanned).await?;
            let licenses = file
                .license_findings
                .iter()
                .map(|l| NewLicenseFinding {
                    license_expression_spdx: l.license_expression_spdx.clone(),
                    start_line: l.start_line,
                    end_line: l.end_line,
                    score: l.score,
                    scanner: scanner.clone(),
                })
                .collect();
            let copyrights = file
                .copyright_findings
                .iter()
                .map(|c| NewCopyrightFinding {
                    statement: c.statement.clone(),
                    start_line: c.start_line,
                    end_line: c.end_line,
                    scanner: scanner.clone(),
                })
                .collect();
            self.repos
                .files
                .replace_findings(sha256, licenses, copyrights)
                .await?;
        }

        for purl in purls {
            let purl = Purl::parse(purl)?;
            let package = self.repos.packages.upsert(&purl, ScanStatus::Scanned).await?;
            self.repos
                .file_trees
                .replace_for_package(package.id, tree.clone())
                .await?;
            let issues = report
                .issues
                .iter()
                .map(|issue| NewScanIssue {
                    severity: issue.severity,
                    source: issue.source.clone(),
                    message: issue.message.clone(),
                    timestamp: issue.timestamp,
                })
                .collect();
            self.repos
                .scan_issues
                .replace_for_package(package.id, issues)
                .await?;

            let propagated = self.bulk.propagate_to(&package).await?;
            if propagated > 0 {
                info!(purl = %package.purl, propagated, "Applied bulk conclusions from other versions");
            }
        }
        Ok(())
    }

    /// Record a failure reported by the scanner agent
    pub async fn mark_failed(&self, job_id: &str, message: &str) -> DomainResult<()> {
        self.jobs.fail(job_id, message).await
    }

    /// Forget the scan of a package so it can be scanned again.
    ///
    /// Curation data stays, it is tied to file content.
    pub async fn delete_results(&self, purl: &str) -> DomainResult<()> {
        Purl::parse(purl)?;
        let package = self
            .repos
            .resolve_package(purl)
            .await?
            .ok_or_else(|| DomainError::not_found("Package", purl))?;
        self.repos
            .file_trees
            .replace_for_package(package.id, Vec::new())
            .await?;
        self.repos
            .scan_issues
            .replace_for_package(package.id, Vec::new())
            .await?;
        self.repos
            .packages
            .set_scan_status(&[package.id], ScanStatus::NotStarted)
            .await?;
        info!(purl = %package.purl, "Deleted scan results");
        Ok(())
    }
}

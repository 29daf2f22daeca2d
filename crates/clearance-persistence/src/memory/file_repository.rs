//! File contents, findings, file trees and scan issues

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;

use clearance_domain::{
    entities::{
        CopyrightFinding, File, FileTree, LicenseFinding, NewCopyrightFinding, NewLicenseFinding,
        NewScanIssue, ScanIssue, ScanStatus,
    },
    errors::DomainResult,
    repositories::{FileRepository, FileTreeRepository, ScanIssueRepository},
};

use super::{next, InMemoryStore};
use crate::error::PersistenceError;

#[async_trait]
impl FileRepository for InMemoryStore {
    async fn find(&self, sha256: &str) -> DomainResult<Option<File>> {
        Ok(self.state.read().files.get(sha256).cloned())
    }

    async fn upsert(&self, sha256: &str, status: ScanStatus) -> DomainResult<File> {
        let mut state = self.state.write();
        let now = Utc::now();
        let file = state
            .files
            .entry(sha256.to_string())
            .and_modify(|f| {
                f.scan_status = status;
                f.updated_at = now;
            })
            .or_insert_with(|| File {
                sha256: sha256.to_string(),
                scan_status: status,
                created_at: now,
                updated_at: now,
            });
        Ok(file.clone())
    }

    async fn replace_findings(
        &self,
        sha256: &str,
        licenses: Vec<NewLicenseFinding>,
        copyrights: Vec<NewCopyrightFinding>,
    ) -> DomainResult<()> {
        let mut state = self.state.write();
        if !state.files.contains_key(sha256) {
            return Err(PersistenceError::not_found("File", sha256).into());
        }

        state.license_findings.retain(|_, f| f.file_sha256 != sha256);
        state.copyright_findings.retain(|_, f| f.file_sha256 != sha256);

        for finding in licenses {
            let id = next(&mut state.sequences.license_finding);
            state.license_findings.insert(
                id,
                LicenseFinding {
                    id,
                    file_sha256: sha256.to_string(),
                    license_expression_spdx: finding.license_expression_spdx,
                    start_line: finding.start_line,
                    end_line: finding.end_line,
                    score: finding.score,
                    scanner: finding.scanner,
                },
            );
        }
        for finding in copyrights {
            let id = next(&mut state.sequences.copyright_finding);
            state.copyright_findings.insert(
                id,
                CopyrightFinding {
                    id,
                    file_sha256: sha256.to_string(),
                    statement: finding.statement,
                    start_line: finding.start_line,
                    end_line: finding.end_line,
                    scanner: finding.scanner,
                },
            );
        }
        Ok(())
    }

    async fn license_findings(&self, sha256s: &[String]) -> DomainResult<Vec<LicenseFinding>> {
        let wanted: HashSet<&str> = sha256s.iter().map(String::as_str).collect();
        let state = self.state.read();
        Ok(state
            .license_findings
            .values()
            .filter(|f| wanted.contains(f.file_sha256.as_str()))
            .cloned()
            .collect())
    }

    async fn copyright_findings(
        &self,
        sha256s: &[String],
    ) -> DomainResult<Vec<CopyrightFinding>> {
        let wanted: HashSet<&str> = sha256s.iter().map(String::as_str).collect();
        let state = self.state.read();
        Ok(state
            .copyright_findings
            .values()
            .filter(|f| wanted.contains(f.file_sha256.as_str()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FileTreeRepository for InMemoryStore {
    async fn replace_for_package(
        &self,
        package_id: i64,
        entries: Vec<(String, String)>,
    ) -> DomainResult<Vec<FileTree>> {
        let mut state = self.state.write();
        if !state.packages.contains_key(&package_id) {
            return Err(PersistenceError::not_found("Package", package_id).into());
        }
        state.file_trees.retain(|_, e| e.package_id != package_id);

        // one entry per path, the last one reported wins
        let by_path: BTreeMap<String, String> = entries.into_iter().collect();
        let mut tree = Vec::with_capacity(by_path.len());
        for (path, file_sha256) in by_path {
            let id = next(&mut state.sequences.file_tree);
            let entry = FileTree {
                id,
                path,
                package_id,
                file_sha256,
            };
            state.file_trees.insert(id, entry.clone());
            tree.push(entry);
        }
        Ok(tree)
    }

    async fn for_package(&self, package_id: i64) -> DomainResult<Vec<FileTree>> {
        let state = self.state.read();
        let mut tree: Vec<FileTree> = state
            .file_trees
            .values()
            .filter(|e| e.package_id == package_id)
            .cloned()
            .collect();
        tree.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(tree)
    }

    async fn find_by_path(&self, package_id: i64, path: &str) -> DomainResult<Option<FileTree>> {
        let state = self.state.read();
        Ok(state
            .file_trees
            .values()
            .find(|e| e.package_id == package_id && e.path == path)
            .cloned())
    }

    async fn for_contents(&self, sha256s: &[String]) -> DomainResult<Vec<FileTree>> {
        let wanted: HashSet<&str> = sha256s.iter().map(String::as_str).collect();
        let state = self.state.read();
        Ok(state
            .file_trees
            .values()
            .filter(|e| wanted.contains(e.file_sha256.as_str()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScanIssueRepository for InMemoryStore {
    async fn replace_for_package(
        &self,
        package_id: i64,
        issues: Vec<NewScanIssue>,
    ) -> DomainResult<Vec<ScanIssue>> {
        let mut state = self.state.write();
        state.scan_issues.retain(|_, i| i.package_id != package_id);
        let mut stored = Vec::with_capacity(issues.len());
        for issue in issues {
            let id = next(&mut state.sequences.scan_issue);
            let issue = ScanIssue {
                id,
                package_id,
                severity: issue.severity,
                source: issue.source,
                message: issue.message,
                timestamp: issue.timestamp,
            };
            state.scan_issues.insert(id, issue.clone());
            stored.push(issue);
        }
        Ok(stored)
    }

    async fn for_package(&self, package_id: i64) -> DomainResult<Vec<ScanIssue>> {
        let state = self.state.read();
        Ok(state
            .scan_issues
            .values()
            .filter(|i| i.package_id == package_id)
            .cloned()
            .collect())
    }
}

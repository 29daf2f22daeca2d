//! Purl cleanup
//!
//! Packages whose purls differ only in qualifiers or subpath describe the
//! same sources. Cleanup keeps one package per group, moves curation data
//! from the others onto it and leaves bookmarks behind so the old purls keep
//! resolving.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::{
    entities::{Package, ScanStatus},
    errors::{DomainError, DomainResult},
    purl::Purl,
    query::{
        BulkConclusionFilter, LicenseConclusionFilter, PathExclusionFilter, TextFilter,
    },
    repositories::Repositories,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupOptions {
    /// Report only, change nothing
    pub dry_run: bool,
    pub pkg_type: Option<String>,
    pub purl: Option<String>,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            pkg_type: None,
            purl: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupBookmark {
    pub purl: String,
    pub bookmark_of: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted_packages: Vec<String>,
    pub bookmarks: Vec<CleanupBookmark>,
    pub moved_license_conclusions: u64,
    pub moved_bulk_conclusions: u64,
    pub moved_path_exclusions: u64,
}

#[derive(Clone)]
pub struct PurlCleanup {
    repos: Repositories,
}

impl PurlCleanup {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn run(&self, options: &CleanupOptions) -> DomainResult<CleanupReport> {
        let only_group = match &options.purl {
            Some(purl) => Some(Purl::parse(purl)?.without_qualifiers().to_string()),
            None => None,
        };
        let pkg_type = options.pkg_type.as_deref().map(str::to_ascii_lowercase);

        let mut groups: BTreeMap<String, Vec<Package>> = BTreeMap::new();
        for package in self.repos.packages.find_all().await? {
            let Ok(purl) = Purl::parse(&package.purl) else {
                continue;
            };
            if pkg_type.as_deref().is_some_and(|t| t != purl.package_type()) {
                continue;
            }
            let key = purl.without_qualifiers().to_string();
            if only_group.as_ref().is_some_and(|only| *only != key) {
                continue;
            }
            groups.entry(key).or_default().push(package);
        }

        let mut plan: Vec<(&Package, Vec<&Package>)> = Vec::new();
        for (key, packages) in &groups {
            if packages.len() < 2 {
                continue;
            }
            let Some(kept) = choose_kept(packages) else {
                continue;
            };
            info!(group = %key, kept = %kept.purl, size = packages.len(), dry_run = options.dry_run, "Cleaning up purl group");
            plan.push((kept, packages.iter().filter(|p| p.id != kept.id).collect()));
        }

        // All or nothing: refuse before touching any group
        if !options.dry_run {
            for other in plan.iter().flat_map(|(_, others)| others) {
                if self.repos.jobs.active_for_package(other.id).await?.is_some() {
                    return Err(DomainError::rule(format!(
                        "{} has a scanner job in progress",
                        other.purl
                    )));
                }
            }
        }

        let mut report = CleanupReport::default();
        for (kept, others) in plan {
            for other in others {
                self.merge(other, kept, options.dry_run, &mut report).await?;
            }
        }

        Ok(report)
    }

    async fn merge(
        &self,
        other: &Package,
        kept: &Package,
        dry_run: bool,
        report: &mut CleanupReport,
    ) -> DomainResult<()> {
        if dry_run {
            report.moved_license_conclusions += self
                .repos
                .license_conclusions
                .count(&LicenseConclusionFilter {
                    context_purl: Some(TextFilter::exact(&other.purl)),
                    ..Default::default()
                })
                .await?;
            report.moved_bulk_conclusions += self
                .repos
                .bulk_conclusions
                .count(&BulkConclusionFilter {
                    context_purl: Some(TextFilter::exact(&other.purl)),
                    ..Default::default()
                })
                .await?;
            report.moved_path_exclusions += self
                .repos
                .path_exclusions
                .count(&PathExclusionFilter {
                    purl: Some(TextFilter::exact(&other.purl)),
                    ..Default::default()
                })
                .await?;
        } else {
            report.moved_license_conclusions += self
                .repos
                .license_conclusions
                .reassign_context(&other.purl, &kept.purl)
                .await?;
            report.moved_bulk_conclusions += self
                .repos
                .bulk_conclusions
                .reassign_context(&other.purl, &kept.purl)
                .await?;
            report.moved_path_exclusions += self
                .repos
                .path_exclusions
                .reassign_context(&other.purl, &kept.purl)
                .await?;
            self.repos.bookmarks.retarget(other.id, kept.id).await?;
            self.repos.packages.delete(other.id).await?;
            self.repos.bookmarks.upsert(&other.purl, kept.id).await?;
        }

        report.deleted_packages.push(other.purl.clone());
        report.bookmarks.push(CleanupBookmark {
            purl: other.purl.clone(),
            bookmark_of: kept.purl.clone(),
        });
        Ok(())
    }
}

/// The most recently scanned package, else the oldest one
fn choose_kept(packages: &[Package]) -> Option<&Package> {
    packages
        .iter()
        .filter(|p| p.scan_status == ScanStatus::Scanned)
        .max_by_key(|p| (p.updated_at, std::cmp::Reverse(p.id)))
        .or_else(|| packages.iter().min_by_key(|p| p.id))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    fn package(id: i64, status: ScanStatus, minutes: i64) -> Package {
        let purl = Purl::parse(&format!("pkg:npm/a@1?build={}", id)).unwrap();
        Package::from_purl(id, &purl, status, Utc::now() + Duration::minutes(minutes))
    }

    #[test]
    fn test_latest_scanned_is_kept() {
        let packages = vec![
            package(1, ScanStatus::Scanned, 0),
            package(2, ScanStatus::Scanned, 5),
            package(3, ScanStatus::Failed, 10),
        ];
        assert_eq!(choose_kept(&packages).unwrap().id, 2);
    }

    #[test]
    fn test_lowest_id_without_scans() {
        let packages = vec![
            package(4, ScanStatus::Pending, 0),
            package(2, ScanStatus::NotStarted, 5),
        ];
        assert_eq!(choose_kept(&packages).unwrap().id, 2);
    }

    #[test]
    fn test_dry_run_by_default() {
        assert!(CleanupOptions::default().dry_run);
    }
}

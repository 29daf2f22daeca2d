//! Bulk-conclusion matching engine
//!
//! A bulk conclusion is a glob pattern evaluated against the file tree of
//! its context package. Every distinct content matched gets one license
//! conclusion owned by the bulk conclusion. Because conclusions are tied to
//! content, the same conclusion also shows up in every other package that
//! contains that content.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info};

use super::{check_opt_spdx, check_spdx, require_owner};
use crate::{
    entities::{
        Actor, BulkConclusion, BulkConclusionChanges, FileTree, NewBulkConclusion, Package,
    },
    errors::{DomainError, DomainResult},
    pattern::PathPattern,
    purl::Purl,
    repositories::Repositories,
};

/// Result of creating a bulk conclusion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreated {
    pub bulk_conclusion_id: i64,
    pub matched_paths_count: usize,
    pub added_license_conclusions_count: usize,
}

/// Result of updating a bulk conclusion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdated {
    pub matched_paths_count: usize,
    pub added_license_conclusions_count: usize,
    pub deleted_license_conclusions_count: usize,
}

/// A path in another package whose content is concluded by a bulk conclusion
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AdditionalMatch {
    pub purl: String,
    pub path: String,
}

/// Files affected by a bulk conclusion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedFiles {
    pub in_context_purl: Vec<String>,
    pub additional_matches: Vec<AdditionalMatch>,
}

#[derive(Clone)]
pub struct BulkConclusionService {
    repos: Repositories,
}

impl BulkConclusionService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Paths of `purl` matched by `pattern`, without storing anything
    pub async fn preview(&self, pattern: &str, purl: &str) -> DomainResult<Vec<String>> {
        let pattern = PathPattern::new(pattern)?;
        let (_, tree) = self.context_tree(purl, "purl").await?;
        Ok(matched(&pattern, &tree)
            .into_iter()
            .map(|entry| entry.path.clone())
            .collect())
    }

    pub async fn create(&self, mut new: NewBulkConclusion) -> DomainResult<BulkCreated> {
        check_spdx(
            "concludedLicenseExpressionSPDX",
            &new.concluded_license_expression_spdx,
        )?;
        check_opt_spdx(
            "detectedLicenseExpressionSPDX",
            new.detected_license_expression_spdx.as_deref(),
        )?;
        let pattern = PathPattern::new(&new.pattern)?;
        let (package, tree) = self.context_tree(&new.context_purl, "contextPurl").await?;

        let hits = matched(&pattern, &tree);
        if hits.is_empty() {
            return Err(DomainError::validation(
                "pattern",
                format!("pattern '{}' does not match any file in {}", pattern, package.purl),
            ));
        }

        new.pattern = pattern.as_str().to_string();
        new.context_purl = package.purl.clone();
        let contents = distinct_contents(&hits);
        let written = self.repos.bulk_conclusions.create(new, &contents).await?;

        info!(
            bulk_conclusion_id = written.bulk.id,
            matched = hits.len(),
            added = written.added,
            "Created bulk conclusion"
        );
        Ok(BulkCreated {
            bulk_conclusion_id: written.bulk.id,
            matched_paths_count: hits.len(),
            added_license_conclusions_count: written.added,
        })
    }

    pub async fn get(&self, id: i64) -> DomainResult<BulkConclusion> {
        self.repos
            .bulk_conclusions
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("BulkConclusion", id))
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        mut changes: BulkConclusionChanges,
    ) -> DomainResult<BulkUpdated> {
        let bulk = self.get(id).await?;
        require_owner(actor, bulk.user_id, "bulk conclusion")?;

        if let Some(concluded) = &changes.concluded_license_expression_spdx {
            check_spdx("concludedLicenseExpressionSPDX", concluded)?;
        }
        if let Some(detected) = &changes.detected_license_expression_spdx {
            check_opt_spdx("detectedLicenseExpressionSPDX", detected.as_deref())?;
        }

        let pattern = match &changes.pattern {
            Some(pattern) => PathPattern::new(pattern)?,
            None => PathPattern::new(&bulk.pattern)?,
        };
        let pattern_changed = pattern.as_str() != bulk.pattern;
        if changes.pattern.is_some() {
            changes.pattern = Some(pattern.as_str().to_string());
        }

        let context = self.repos.resolve_package(&bulk.context_purl).await?;
        let tree = match &context {
            Some(package) => self.repos.file_trees.for_package(package.id).await?,
            None => Vec::new(),
        };
        let hits = matched(&pattern, &tree);

        let written = if pattern_changed {
            if hits.is_empty() {
                return Err(DomainError::validation(
                    "pattern",
                    format!("pattern '{}' does not match any file in {}", pattern, bulk.context_purl),
                ));
            }
            let contents = distinct_contents(&hits);
            self.repos
                .bulk_conclusions
                .update(id, &changes, Some(&contents))
                .await?
        } else {
            self.repos.bulk_conclusions.update(id, &changes, None).await?
        };

        info!(
            bulk_conclusion_id = id,
            added = written.added,
            deleted = written.deleted,
            "Updated bulk conclusion"
        );
        Ok(BulkUpdated {
            matched_paths_count: hits.len(),
            added_license_conclusions_count: written.added,
            deleted_license_conclusions_count: written.deleted,
        })
    }

    /// Delete a bulk conclusion and the conclusions it owns
    pub async fn delete(&self, actor: &Actor, id: i64) -> DomainResult<usize> {
        let bulk = self.get(id).await?;
        require_owner(actor, bulk.user_id, "bulk conclusion")?;
        let removed = self.repos.bulk_conclusions.delete(id).await?;
        info!(bulk_conclusion_id = id, removed, "Deleted bulk conclusion");
        Ok(removed)
    }

    pub async fn affected_files(&self, id: i64) -> DomainResult<AffectedFiles> {
        let bulk = self.get(id).await?;
        let pattern = PathPattern::new(&bulk.pattern)?;

        let context = self.repos.resolve_package(&bulk.context_purl).await?;
        let in_context_purl = match &context {
            Some(package) => {
                let tree = self.repos.file_trees.for_package(package.id).await?;
                matched(&pattern, &tree)
                    .into_iter()
                    .map(|entry| entry.path.clone())
                    .collect()
            }
            None => Vec::new(),
        };

        let contents: Vec<String> = self
            .repos
            .license_conclusions
            .for_bulk(id)
            .await?
            .into_iter()
            .map(|c| c.file_sha256)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let entries = self.repos.file_trees.for_contents(&contents).await?;

        let context_id = context.as_ref().map(|p| p.id);
        let mut purls: HashMap<i64, Option<String>> = HashMap::new();
        let mut additional_matches = Vec::new();
        for entry in entries {
            if Some(entry.package_id) == context_id {
                continue;
            }
            if !purls.contains_key(&entry.package_id) {
                let purl = self
                    .repos
                    .packages
                    .find_by_id(entry.package_id)
                    .await?
                    .map(|p| p.purl);
                purls.insert(entry.package_id, purl);
            }
            if let Some(Some(purl)) = purls.get(&entry.package_id) {
                additional_matches.push(AdditionalMatch {
                    purl: purl.clone(),
                    path: entry.path,
                });
            }
        }
        additional_matches.sort();

        Ok(AffectedFiles {
            in_context_purl,
            additional_matches,
        })
    }

    /// Re-apply non-local bulk conclusions made in other versions of the
    /// same package to `package`'s file tree. Returns the number of license
    /// conclusions added.
    pub async fn propagate_to(&self, package: &Package) -> DomainResult<usize> {
        let target = Purl::parse(&package.purl)?;
        let tree = self.repos.file_trees.for_package(package.id).await?;
        if tree.is_empty() {
            return Ok(0);
        }

        let mut added = 0;
        for bulk in self.repos.bulk_conclusions.find_all().await? {
            if bulk.local || bulk.context_purl == package.purl {
                continue;
            }
            let Ok(context) = Purl::parse(&bulk.context_purl) else {
                continue;
            };
            if !context.same_package(&target) {
                continue;
            }
            let Ok(pattern) = PathPattern::new(&bulk.pattern) else {
                continue;
            };
            let hits = matched(&pattern, &tree);
            if hits.is_empty() {
                continue;
            }
            let count = self
                .repos
                .bulk_conclusions
                .extend(bulk.id, &distinct_contents(&hits))
                .await?;
            debug!(bulk_conclusion_id = bulk.id, purl = %package.purl, count, "Propagated bulk conclusion");
            added += count;
        }
        Ok(added)
    }

    async fn context_tree(&self, purl: &str, field: &str) -> DomainResult<(Package, Vec<FileTree>)> {
        Purl::parse(purl).map_err(|e| e.at_field(field))?;
        let package = self
            .repos
            .resolve_package(purl)
            .await?
            .ok_or_else(|| DomainError::not_found("Package", purl))?;
        let tree = self.repos.file_trees.for_package(package.id).await?;
        Ok((package, tree))
    }
}

/// Tree entries matched by `pattern`, in tree order
fn matched<'a>(pattern: &PathPattern, tree: &'a [FileTree]) -> Vec<&'a FileTree> {
    tree.iter().filter(|entry| pattern.is_match(&entry.path)).collect()
}

/// Distinct content of the entries, sorted
fn distinct_contents(entries: &[&FileTree]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.file_sha256.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, path: &str, sha: &str) -> FileTree {
        FileTree {
            id,
            path: path.to_string(),
            package_id: 1,
            file_sha256: sha.to_string(),
        }
    }

    #[test]
    fn test_duplicate_content_counts_once() {
        let tree = vec![
            entry(1, "a/LICENSE", "aa"),
            entry(2, "b/LICENSE", "aa"),
            entry(3, "b/index.js", "bb"),
        ];
        let pattern = PathPattern::new("**/LICENSE").unwrap();
        let hits = matched(&pattern, &tree);
        assert_eq!(hits.len(), 2);
        assert_eq!(distinct_contents(&hits), vec!["aa".to_string()]);
    }
}

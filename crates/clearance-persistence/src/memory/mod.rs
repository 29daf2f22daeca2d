//! In-memory store
//!
//! One [`InMemoryStore`] implements every repository trait of the domain.
//! All records live in a single [`StoreState`] behind one `RwLock`, so each
//! repository call sees and produces a consistent state even when it touches
//! several collections.

mod conclusion_repository;
mod exclusion_repository;
mod file_repository;
mod job_repository;
mod package_repository;
mod user_repository;

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use clearance_domain::entities::{
    AccessToken, BulkConclusion, CopyrightFinding, File, FileTree, LicenseConclusion,
    LicenseFinding, Package, PathExclusion, PurlBookmark, ScanIssue, ScannerJob, User,
};

/// Id counters; each hands out 1, 2, 3, ... and never reuses a value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sequences {
    package: i64,
    file_tree: i64,
    license_finding: i64,
    copyright_finding: i64,
    scan_issue: i64,
    license_conclusion: i64,
    bulk_conclusion: i64,
    path_exclusion: i64,
    user: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// Every record of the store. Serializes to the snapshot format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreState {
    sequences: Sequences,
    packages: BTreeMap<i64, Package>,
    bookmarks: BTreeMap<String, PurlBookmark>,
    files: BTreeMap<String, File>,
    license_findings: BTreeMap<i64, LicenseFinding>,
    copyright_findings: BTreeMap<i64, CopyrightFinding>,
    file_trees: BTreeMap<i64, FileTree>,
    scan_issues: BTreeMap<i64, ScanIssue>,
    license_conclusions: BTreeMap<i64, LicenseConclusion>,
    bulk_conclusions: BTreeMap<i64, BulkConclusion>,
    path_exclusions: BTreeMap<i64, PathExclusion>,
    jobs: BTreeMap<String, ScannerJob>,
    users: BTreeMap<i64, User>,
    tokens: BTreeMap<String, AccessToken>,
}

impl StoreState {
    fn username(&self, user_id: i64) -> Option<&str> {
        self.users.get(&user_id).map(|u| u.username.as_str())
    }

    fn package_by_purl(&self, purl: &str) -> Option<&Package> {
        self.packages.values().find(|p| p.purl == purl)
    }

    /// Package for a purl or a bookmark pointing at it
    fn resolve_package(&self, purl: &str) -> Option<&Package> {
        self.package_by_purl(purl).or_else(|| {
            self.bookmarks
                .get(purl)
                .and_then(|b| self.packages.get(&b.package_id))
        })
    }

    /// Content hashes in a package's file tree; empty for unknown purls
    fn contents_of(&self, purl: &str) -> BTreeSet<String> {
        match self.resolve_package(purl) {
            Some(package) => self
                .file_trees
                .values()
                .filter(|e| e.package_id == package.id)
                .map(|e| e.file_sha256.clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Number of records per collection
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("packages", self.packages.len()),
            ("files", self.files.len()),
            ("fileTrees", self.file_trees.len()),
            ("licenseConclusions", self.license_conclusions.len()),
            ("bulkConclusions", self.bulk_conclusions.len()),
            ("pathExclusions", self.path_exclusions.len()),
            ("jobs", self.jobs.len()),
            ("users", self.users.len()),
        ])
    }
}

/// Thread-safe in-memory implementation of all repositories
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use clearance_domain::Repositories;
/// use clearance_persistence::InMemoryStore;
///
/// let repos = Repositories::from_store(Arc::new(InMemoryStore::new()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `state`
    pub fn with_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy of the current state
    pub fn state(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Number of records per collection
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        self.state.read().counts()
    }
}

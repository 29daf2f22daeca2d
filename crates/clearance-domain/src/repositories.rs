//! Repository interfaces for data persistence
//!
//! The domain defines the contracts; `clearance-persistence` implements them.
//! Each call is atomic: implementations must apply multi-record changes
//! (a bulk conclusion and the license conclusions it owns) as one unit.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    entities::*,
    errors::DomainResult,
    purl::Purl,
    query::*,
};

/// Packages keyed by purl
#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> DomainResult<Option<Package>>;

    async fn find_by_purl(&self, purl: &str) -> DomainResult<Option<Package>>;

    /// Insert the package if missing, then set its scan status
    async fn upsert(&self, purl: &Purl, status: ScanStatus) -> DomainResult<Package>;

    async fn set_scan_status(&self, ids: &[i64], status: ScanStatus) -> DomainResult<()>;

    async fn list(&self, query: &ListQuery<PackageFilter, PackageSortBy>)
        -> DomainResult<Vec<Package>>;

    async fn count(&self, filter: &PackageFilter) -> DomainResult<u64>;

    async fn find_all(&self) -> DomainResult<Vec<Package>>;

    /// Delete a package together with its file tree and scan issues
    async fn delete(&self, id: i64) -> DomainResult<()>;
}

/// Alias purls left behind by purl cleanup
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    async fn upsert(&self, purl: &str, package_id: i64) -> DomainResult<PurlBookmark>;

    async fn find(&self, purl: &str) -> DomainResult<Option<PurlBookmark>>;

    /// Point every bookmark of `from_package` at `to_package`
    async fn retarget(&self, from_package: i64, to_package: i64) -> DomainResult<u64>;
}

/// File contents and their findings
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn find(&self, sha256: &str) -> DomainResult<Option<File>>;

    async fn upsert(&self, sha256: &str, status: ScanStatus) -> DomainResult<File>;

    /// Replace all findings of a file
    async fn replace_findings(
        &self,
        sha256: &str,
        licenses: Vec<NewLicenseFinding>,
        copyrights: Vec<NewCopyrightFinding>,
    ) -> DomainResult<()>;

    async fn license_findings(&self, sha256s: &[String]) -> DomainResult<Vec<LicenseFinding>>;

    async fn copyright_findings(&self, sha256s: &[String])
        -> DomainResult<Vec<CopyrightFinding>>;
}

/// Path to content mapping of each package
#[async_trait]
pub trait FileTreeRepository: Send + Sync {
    /// Replace a package's tree with `(path, sha256)` entries
    async fn replace_for_package(
        &self,
        package_id: i64,
        entries: Vec<(String, String)>,
    ) -> DomainResult<Vec<FileTree>>;

    /// Entries of one package, ordered by path
    async fn for_package(&self, package_id: i64) -> DomainResult<Vec<FileTree>>;

    async fn find_by_path(&self, package_id: i64, path: &str) -> DomainResult<Option<FileTree>>;

    /// Entries of any package whose content is one of `sha256s`
    async fn for_contents(&self, sha256s: &[String]) -> DomainResult<Vec<FileTree>>;
}

#[async_trait]
pub trait ScanIssueRepository: Send + Sync {
    async fn replace_for_package(
        &self,
        package_id: i64,
        issues: Vec<NewScanIssue>,
    ) -> DomainResult<Vec<ScanIssue>>;

    async fn for_package(&self, package_id: i64) -> DomainResult<Vec<ScanIssue>>;
}

#[async_trait]
pub trait LicenseConclusionRepository: Send + Sync {
    async fn create(&self, conclusion: NewLicenseConclusion) -> DomainResult<LicenseConclusion>;

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<LicenseConclusion>>;

    async fn update(
        &self,
        id: i64,
        changes: &LicenseConclusionChanges,
    ) -> DomainResult<LicenseConclusion>;

    async fn delete(&self, id: i64) -> DomainResult<()>;

    async fn list(
        &self,
        query: &ListQuery<LicenseConclusionFilter, LicenseConclusionSortBy>,
    ) -> DomainResult<Vec<LicenseConclusion>>;

    async fn count(&self, filter: &LicenseConclusionFilter) -> DomainResult<u64>;

    /// Conclusions on any of `sha256s`
    async fn for_contents(&self, sha256s: &[String]) -> DomainResult<Vec<LicenseConclusion>>;

    /// Conclusions owned by a bulk conclusion
    async fn for_bulk(&self, bulk_id: i64) -> DomainResult<Vec<LicenseConclusion>>;

    /// Move conclusions made in `from` to the `to` context
    async fn reassign_context(&self, from: &str, to: &str) -> DomainResult<u64>;
}

/// Outcome of writing a bulk conclusion and its owned conclusions
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWrite {
    pub bulk: BulkConclusion,
    pub added: usize,
    pub deleted: usize,
}

#[async_trait]
pub trait BulkConclusionRepository: Send + Sync {
    /// Store a bulk conclusion and one owned conclusion per content
    async fn create(
        &self,
        bulk: NewBulkConclusion,
        sha256s: &[String],
    ) -> DomainResult<BulkWrite>;

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<BulkConclusion>>;

    /// Apply `changes` to the bulk conclusion and all owned conclusions.
    ///
    /// When `sha256s` is given, owned conclusions are re-resolved against it:
    /// content no longer listed loses its conclusion and new content gains one.
    async fn update(
        &self,
        id: i64,
        changes: &BulkConclusionChanges,
        sha256s: Option<&[String]>,
    ) -> DomainResult<BulkWrite>;

    /// Add owned conclusions for content not yet concluded by this bulk
    async fn extend(&self, id: i64, sha256s: &[String]) -> DomainResult<usize>;

    /// Delete the bulk conclusion and its owned conclusions; returns the
    /// number of conclusions removed
    async fn delete(&self, id: i64) -> DomainResult<usize>;

    async fn list(
        &self,
        query: &ListQuery<BulkConclusionFilter, BulkConclusionSortBy>,
    ) -> DomainResult<Vec<BulkConclusion>>;

    async fn count(&self, filter: &BulkConclusionFilter) -> DomainResult<u64>;

    async fn find_all(&self) -> DomainResult<Vec<BulkConclusion>>;

    async fn reassign_context(&self, from: &str, to: &str) -> DomainResult<u64>;
}

#[async_trait]
pub trait PathExclusionRepository: Send + Sync {
    async fn create(&self, exclusion: NewPathExclusion) -> DomainResult<PathExclusion>;

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<PathExclusion>>;

    async fn update(&self, id: i64, changes: &PathExclusionChanges)
        -> DomainResult<PathExclusion>;

    async fn delete(&self, id: i64) -> DomainResult<()>;

    async fn list(
        &self,
        query: &ListQuery<PathExclusionFilter, PathExclusionSortBy>,
    ) -> DomainResult<Vec<PathExclusion>>;

    async fn count(&self, filter: &PathExclusionFilter) -> DomainResult<u64>;

    /// Exclusions recorded for exactly this purl, by id
    async fn for_purl(&self, purl: &str) -> DomainResult<Vec<PathExclusion>>;

    async fn reassign_context(&self, from: &str, to: &str) -> DomainResult<u64>;
}

#[async_trait]
pub trait ScannerJobRepository: Send + Sync {
    async fn create(&self, job: &ScannerJob) -> DomainResult<()>;

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ScannerJob>>;

    /// Apply `change` to the stored job in one step; returns the new state.
    /// Nothing is written when `change` fails.
    async fn update(
        &self,
        id: &str,
        change: &(dyn for<'j> Fn(&'j mut ScannerJob) -> DomainResult<()> + Send + Sync),
    ) -> DomainResult<ScannerJob>;

    /// Most recent non-terminal job covering the package
    async fn active_for_package(&self, package_id: i64) -> DomainResult<Option<ScannerJob>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with a validation error on `username` when it is taken
    async fn create(&self, user: NewUser) -> DomainResult<User>;

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>>;

    async fn list(&self) -> DomainResult<Vec<User>>;

    async fn delete(&self, id: i64) -> DomainResult<()>;

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> DomainResult<()>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn insert(&self, token: AccessToken) -> DomainResult<()>;

    async fn find(&self, token_hash: &str) -> DomainResult<Option<AccessToken>>;

    /// Returns whether a token was removed
    async fn revoke(&self, token_hash: &str) -> DomainResult<bool>;

    /// Revoke a user's tokens, optionally only of one kind
    async fn revoke_for_user(&self, user_id: i64, kind: Option<TokenKind>) -> DomainResult<u64>;
}

/// Every repository behind one cloneable handle
#[derive(Clone)]
pub struct Repositories {
    pub packages: Arc<dyn PackageRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub files: Arc<dyn FileRepository>,
    pub file_trees: Arc<dyn FileTreeRepository>,
    pub scan_issues: Arc<dyn ScanIssueRepository>,
    pub license_conclusions: Arc<dyn LicenseConclusionRepository>,
    pub bulk_conclusions: Arc<dyn BulkConclusionRepository>,
    pub path_exclusions: Arc<dyn PathExclusionRepository>,
    pub jobs: Arc<dyn ScannerJobRepository>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<dyn TokenRepository>,
}

impl Repositories {
    /// Use one store for every repository
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: PackageRepository
            + BookmarkRepository
            + FileRepository
            + FileTreeRepository
            + ScanIssueRepository
            + LicenseConclusionRepository
            + BulkConclusionRepository
            + PathExclusionRepository
            + ScannerJobRepository
            + UserRepository
            + TokenRepository
            + 'static,
    {
        Self {
            packages: store.clone(),
            bookmarks: store.clone(),
            files: store.clone(),
            file_trees: store.clone(),
            scan_issues: store.clone(),
            license_conclusions: store.clone(),
            bulk_conclusions: store.clone(),
            path_exclusions: store.clone(),
            jobs: store.clone(),
            users: store.clone(),
            tokens: store,
        }
    }

    /// Find a package by its purl or by a bookmark pointing at it
    pub async fn resolve_package(&self, purl: &str) -> DomainResult<Option<Package>> {
        if let Some(package) = self.packages.find_by_purl(purl).await? {
            return Ok(Some(package));
        }
        match self.bookmarks.find(purl).await? {
            Some(bookmark) => self.packages.find_by_id(bookmark.package_id).await,
            None => Ok(None),
        }
    }
}

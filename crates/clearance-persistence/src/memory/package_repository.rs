//! Packages and purl bookmarks

use async_trait::async_trait;
use chrono::Utc;

use clearance_domain::{
    entities::{Package, PurlBookmark, ScanStatus},
    errors::DomainResult,
    purl::Purl,
    query::{sort_records, ListQuery, PackageFilter, PackageSortBy, SortKey},
    repositories::{BookmarkRepository, PackageRepository},
};

use super::{next, InMemoryStore};
use crate::error::PersistenceError;

fn sort_key(package: &Package, sort_by: Option<PackageSortBy>) -> SortKey {
    match sort_by {
        None | Some(PackageSortBy::Id) => SortKey::Int(package.id),
        Some(PackageSortBy::Purl) => SortKey::text(&package.purl),
        Some(PackageSortBy::Type) => SortKey::text(&package.package_type),
        Some(PackageSortBy::Namespace) => SortKey::opt_text(package.namespace.as_deref()),
        Some(PackageSortBy::Name) => SortKey::text(&package.name),
        Some(PackageSortBy::Version) => SortKey::opt_text(package.version.as_deref()),
        Some(PackageSortBy::ScanStatus) => SortKey::text(package.scan_status.as_str()),
        Some(PackageSortBy::CreatedAt) => SortKey::Time(package.created_at),
        Some(PackageSortBy::UpdatedAt) => SortKey::Time(package.updated_at),
    }
}

#[async_trait]
impl PackageRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> DomainResult<Option<Package>> {
        Ok(self.state.read().packages.get(&id).cloned())
    }

    async fn find_by_purl(&self, purl: &str) -> DomainResult<Option<Package>> {
        Ok(self.state.read().package_by_purl(purl).cloned())
    }

    async fn upsert(&self, purl: &Purl, status: ScanStatus) -> DomainResult<Package> {
        let mut state = self.state.write();
        let now = Utc::now();

        if let Some(package) = state
            .packages
            .values_mut()
            .find(|p| p.purl == purl.as_str())
        {
            package.scan_status = status;
            package.updated_at = now;
            return Ok(package.clone());
        }

        let id = next(&mut state.sequences.package);
        let package = Package::from_purl(id, purl, status, now);
        state.packages.insert(id, package.clone());
        Ok(package)
    }

    async fn set_scan_status(&self, ids: &[i64], status: ScanStatus) -> DomainResult<()> {
        let mut state = self.state.write();
        let now = Utc::now();
        for id in ids {
            if let Some(package) = state.packages.get_mut(id) {
                package.scan_status = status;
                package.updated_at = now;
            }
        }
        Ok(())
    }

    async fn list(
        &self,
        query: &ListQuery<PackageFilter, PackageSortBy>,
    ) -> DomainResult<Vec<Package>> {
        let state = self.state.read();
        let mut packages: Vec<Package> = state
            .packages
            .values()
            .filter(|p| query.filter.matches(p))
            .cloned()
            .collect();
        sort_records(
            &mut packages,
            query.sort_order,
            |p| sort_key(p, query.sort_by),
            |p| p.id,
        );
        Ok(query.pagination.apply(packages))
    }

    async fn count(&self, filter: &PackageFilter) -> DomainResult<u64> {
        let state = self.state.read();
        Ok(state.packages.values().filter(|p| filter.matches(p)).count() as u64)
    }

    async fn find_all(&self) -> DomainResult<Vec<Package>> {
        Ok(self.state.read().packages.values().cloned().collect())
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        let mut state = self.state.write();
        if state.packages.remove(&id).is_none() {
            return Err(PersistenceError::not_found("Package", id).into());
        }
        state.file_trees.retain(|_, e| e.package_id != id);
        state.scan_issues.retain(|_, i| i.package_id != id);
        state.bookmarks.retain(|_, b| b.package_id != id);
        Ok(())
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryStore {
    async fn upsert(&self, purl: &str, package_id: i64) -> DomainResult<PurlBookmark> {
        let mut state = self.state.write();
        if !state.packages.contains_key(&package_id) {
            return Err(PersistenceError::not_found("Package", package_id).into());
        }
        let bookmark = PurlBookmark {
            purl: purl.to_string(),
            package_id,
            created_at: Utc::now(),
        };
        state.bookmarks.insert(purl.to_string(), bookmark.clone());
        Ok(bookmark)
    }

    async fn find(&self, purl: &str) -> DomainResult<Option<PurlBookmark>> {
        Ok(self.state.read().bookmarks.get(purl).cloned())
    }

    async fn retarget(&self, from_package: i64, to_package: i64) -> DomainResult<u64> {
        let mut state = self.state.write();
        let mut moved = 0;
        for bookmark in state.bookmarks.values_mut() {
            if bookmark.package_id == from_package {
                bookmark.package_id = to_package;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

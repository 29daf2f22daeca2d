//! Filtering, sorting and pagination for list endpoints

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{PathExclusionReason, ScanStatus};

/// Largest accepted page size
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Page selection. Without a page size every record is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page_index: u32,
    pub page_size: Option<u32>,
}

impl Pagination {
    pub fn new(page_index: u32, page_size: Option<u32>) -> Self {
        Self {
            page_index,
            page_size,
        }
    }

    /// Cut the requested page out of an already sorted list
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        match self.page_size {
            Some(size) => {
                let skip = self.page_index as usize * size as usize;
                items.into_iter().skip(skip).take(size as usize).collect()
            }
            None => items,
        }
    }
}

/// Text condition: exact match when `strict`, otherwise case-insensitive substring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub value: String,
    pub strict: bool,
}

impl TextFilter {
    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            strict: false,
        }
    }

    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            strict: true,
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        if self.strict {
            candidate == self.value
        } else {
            candidate
                .to_lowercase()
                .contains(&self.value.to_lowercase())
        }
    }

    /// Missing values never match
    pub fn matches_opt(&self, candidate: Option<&str>) -> bool {
        candidate.is_some_and(|c| self.matches(c))
    }
}

/// Inclusive timestamp range; open ends are unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub gte: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.gte.map_or(true, |gte| at >= gte) && self.lte.map_or(true, |lte| at <= lte)
    }

    pub fn is_unbounded(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }
}

fn text_ok(filter: &Option<TextFilter>, candidate: &str) -> bool {
    filter.as_ref().map_or(true, |f| f.matches(candidate))
}

fn opt_text_ok(filter: &Option<TextFilter>, candidate: Option<&str>) -> bool {
    filter.as_ref().map_or(true, |f| f.matches_opt(candidate))
}

/// Filters for license conclusions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseConclusionFilter {
    /// Conclusions on content found in this package's file tree
    pub purl: Option<String>,
    pub context_purl: Option<TextFilter>,
    pub username: Option<TextFilter>,
    pub detected_license: Option<TextFilter>,
    pub concluded_license: Option<TextFilter>,
    pub comment: Option<TextFilter>,
    pub has_bulk_conclusion: Option<bool>,
    pub created_at: DateRange,
    pub updated_at: DateRange,
}

impl LicenseConclusionFilter {
    /// Check the record-local conditions. `purl` needs the file tree and
    /// is resolved by the store.
    pub fn matches(
        &self,
        conclusion: &crate::entities::LicenseConclusion,
        username: Option<&str>,
    ) -> bool {
        text_ok(&self.context_purl, &conclusion.context_purl)
            && opt_text_ok(&self.username, username)
            && opt_text_ok(
                &self.detected_license,
                conclusion.detected_license_expression_spdx.as_deref(),
            )
            && text_ok(
                &self.concluded_license,
                &conclusion.concluded_license_expression_spdx,
            )
            && opt_text_ok(&self.comment, conclusion.comment.as_deref())
            && self
                .has_bulk_conclusion
                .map_or(true, |has| conclusion.bulk_conclusion_id.is_some() == has)
            && self.created_at.contains(conclusion.created_at)
            && self.updated_at.contains(conclusion.updated_at)
    }
}

/// Filters for bulk conclusions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkConclusionFilter {
    /// Bulk conclusions with at least one conclusion on this package's content
    pub purl: Option<String>,
    pub context_purl: Option<TextFilter>,
    pub username: Option<TextFilter>,
    pub pattern: Option<TextFilter>,
    pub detected_license: Option<TextFilter>,
    pub concluded_license: Option<TextFilter>,
    pub comment: Option<TextFilter>,
    pub created_at: DateRange,
    pub updated_at: DateRange,
}

impl BulkConclusionFilter {
    pub fn matches(&self, bulk: &crate::entities::BulkConclusion, username: Option<&str>) -> bool {
        text_ok(&self.context_purl, &bulk.context_purl)
            && opt_text_ok(&self.username, username)
            && text_ok(&self.pattern, &bulk.pattern)
            && opt_text_ok(
                &self.detected_license,
                bulk.detected_license_expression_spdx.as_deref(),
            )
            && text_ok(&self.concluded_license, &bulk.concluded_license_expression_spdx)
            && opt_text_ok(&self.comment, bulk.comment.as_deref())
            && self.created_at.contains(bulk.created_at)
            && self.updated_at.contains(bulk.updated_at)
    }
}

/// Filters for path exclusions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathExclusionFilter {
    pub purl: Option<TextFilter>,
    pub username: Option<TextFilter>,
    pub pattern: Option<TextFilter>,
    pub reason: Option<PathExclusionReason>,
    pub comment: Option<TextFilter>,
    pub created_at: DateRange,
    pub updated_at: DateRange,
}

impl PathExclusionFilter {
    pub fn matches(
        &self,
        exclusion: &crate::entities::PathExclusion,
        username: Option<&str>,
    ) -> bool {
        text_ok(&self.purl, &exclusion.purl)
            && opt_text_ok(&self.username, username)
            && text_ok(&self.pattern, &exclusion.pattern)
            && self.reason.map_or(true, |reason| exclusion.reason == reason)
            && opt_text_ok(&self.comment, exclusion.comment.as_deref())
            && self.created_at.contains(exclusion.created_at)
            && self.updated_at.contains(exclusion.updated_at)
    }
}

/// Filters for packages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageFilter {
    pub purl: Option<TextFilter>,
    pub package_type: Option<TextFilter>,
    pub namespace: Option<TextFilter>,
    pub name: Option<TextFilter>,
    pub version: Option<TextFilter>,
    pub scan_status: Option<ScanStatus>,
    pub created_at: DateRange,
    pub updated_at: DateRange,
}

impl PackageFilter {
    pub fn matches(&self, package: &crate::entities::Package) -> bool {
        text_ok(&self.purl, &package.purl)
            && text_ok(&self.package_type, &package.package_type)
            && opt_text_ok(&self.namespace, package.namespace.as_deref())
            && text_ok(&self.name, &package.name)
            && opt_text_ok(&self.version, package.version.as_deref())
            && self.scan_status.map_or(true, |s| package.scan_status == s)
            && self.created_at.contains(package.created_at)
            && self.updated_at.contains(package.updated_at)
    }
}

/// Sortable columns of license conclusions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseConclusionSortBy {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "contextPurl")]
    ContextPurl,
    #[serde(rename = "username")]
    Username,
    #[serde(rename = "detectedLicenseExpressionSPDX")]
    DetectedLicense,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    ConcludedLicense,
    #[serde(rename = "comment")]
    Comment,
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "updatedAt")]
    UpdatedAt,
}

/// Sortable columns of bulk conclusions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkConclusionSortBy {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "pattern")]
    Pattern,
    #[serde(rename = "contextPurl")]
    ContextPurl,
    #[serde(rename = "username")]
    Username,
    #[serde(rename = "detectedLicenseExpressionSPDX")]
    DetectedLicense,
    #[serde(rename = "concludedLicenseExpressionSPDX")]
    ConcludedLicense,
    #[serde(rename = "comment")]
    Comment,
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "updatedAt")]
    UpdatedAt,
}

/// Sortable columns of path exclusions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathExclusionSortBy {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "purl")]
    Purl,
    #[serde(rename = "pattern")]
    Pattern,
    #[serde(rename = "reason")]
    Reason,
    #[serde(rename = "comment")]
    Comment,
    #[serde(rename = "username")]
    Username,
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "updatedAt")]
    UpdatedAt,
}

/// Sortable columns of packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageSortBy {
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "purl")]
    Purl,
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "namespace")]
    Namespace,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "version")]
    Version,
    #[serde(rename = "scanStatus")]
    ScanStatus,
    #[serde(rename = "createdAt")]
    CreatedAt,
    #[serde(rename = "updatedAt")]
    UpdatedAt,
}

/// A list request: filter, sort and page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery<F, S> {
    pub filter: F,
    /// `None` sorts by id
    pub sort_by: Option<S>,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

impl<F: Default, S> ListQuery<F, S> {
    /// Everything, id ascending
    pub fn all() -> Self {
        Self {
            filter: F::default(),
            sort_by: None,
            sort_order: SortOrder::Asc,
            pagination: Pagination::default(),
        }
    }
}

/// Comparable value extracted from a record for sorting.
///
/// Missing values sort before present ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
}

impl SortKey {
    pub fn text(value: &str) -> Self {
        SortKey::Text(value.to_lowercase())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map_or(SortKey::Null, SortKey::text)
    }
}

/// Sort records by `key`, breaking ties by ascending id
pub fn sort_records<T>(
    items: &mut [T],
    order: SortOrder,
    key: impl Fn(&T) -> SortKey,
    id: impl Fn(&T) -> i64,
) {
    items.sort_by(|a, b| {
        let primary = key(a).cmp(&key(b));
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        match primary {
            Ordering::Equal => id(a).cmp(&id(b)),
            other => other,
        }
    });
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_text_filter_modes() {
        assert!(TextFilter::contains("LODASH").matches("pkg:npm/lodash@4"));
        assert!(!TextFilter::exact("pkg:npm/lodash").matches("pkg:npm/lodash@4"));
        assert!(TextFilter::exact("pkg:npm/lodash@4").matches("pkg:npm/lodash@4"));
        assert!(!TextFilter::contains("x").matches_opt(None));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let day = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let range = DateRange {
            gte: Some(day(2)),
            lte: Some(day(4)),
        };
        assert!(!range.contains(day(1)));
        assert!(range.contains(day(2)));
        assert!(range.contains(day(4)));
        assert!(!range.contains(day(5)));
        assert!(DateRange::default().contains(day(1)));
    }

    #[test]
    fn test_pagination() {
        let items: Vec<i32> = (0..25).collect();
        assert_eq!(Pagination::new(0, Some(10)).apply(items.clone()).len(), 10);
        assert_eq!(Pagination::new(2, Some(10)).apply(items.clone()), (20..25).collect::<Vec<_>>());
        assert!(Pagination::new(3, Some(10)).apply(items.clone()).is_empty());
        assert_eq!(Pagination::new(5, None).apply(items).len(), 25);
    }

    #[test]
    fn test_sort_records_breaks_ties_by_id() {
        let mut rows = vec![(3, "b"), (1, "b"), (2, "a")];
        sort_records(&mut rows, SortOrder::Desc, |r| SortKey::text(r.1), |r| r.0);
        assert_eq!(rows, vec![(1, "b"), (3, "b"), (2, "a")]);
    }

    #[test]
    fn test_null_sorts_first() {
        let mut rows = vec![(1, Some("x")), (2, None)];
        sort_records(&mut rows, SortOrder::Asc, |r| SortKey::opt_text(r.1), |r| r.0);
        assert_eq!(rows[0].0, 2);
    }

    #[test]
    fn test_sort_by_wire_names() {
        let sort: LicenseConclusionSortBy =
            serde_json::from_str("\"concludedLicenseExpressionSPDX\"").unwrap();
        assert_eq!(sort, LicenseConclusionSortBy::ConcludedLicense);
        assert!(serde_json::from_str::<PackageSortBy>("\"size\"").is_err());
        assert_eq!(serde_json::to_string(&SortOrder::Desc).unwrap(), "\"desc\"");
    }
}

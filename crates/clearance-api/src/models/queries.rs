//! Query parameters of the list endpoints

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use clearance_domain::{
    entities::{PathExclusionReason, ScanStatus},
    query::*,
};

use crate::error::{ApiError, ApiResult};

fn text(value: Option<String>, strict: Option<bool>) -> Option<TextFilter> {
    value.map(|value| TextFilter {
        value,
        strict: strict.unwrap_or(false),
    })
}

fn range(gte: Option<DateTime<Utc>>, lte: Option<DateTime<Utc>>) -> DateRange {
    DateRange { gte, lte }
}

fn pagination(page_index: Option<u32>, page_size: Option<u32>) -> ApiResult<Pagination> {
    if let Some(size) = page_size {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(ApiError::validation(
                "pageSize",
                format!("pageSize must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
    }
    Ok(Pagination::new(page_index.unwrap_or(0), page_size))
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct LicenseConclusionQuery {
    pub page_index: Option<u32>,
    pub page_size: Option<u32>,
    #[param(value_type = Option<String>, example = "createdAt")]
    pub sort_by: Option<LicenseConclusionSortBy>,
    #[param(value_type = Option<String>, example = "desc")]
    pub sort_order: Option<SortOrder>,
    /// Conclusions on content of this package
    pub purl: Option<String>,
    pub context_purl: Option<String>,
    pub context_purl_strict: Option<bool>,
    pub username: Option<String>,
    pub username_strict: Option<bool>,
    pub detected_license: Option<String>,
    pub concluded_license: Option<String>,
    pub comment: Option<String>,
    pub has_bulk_conclusion: Option<bool>,
    pub created_at_gte: Option<DateTime<Utc>>,
    pub created_at_lte: Option<DateTime<Utc>>,
    pub updated_at_gte: Option<DateTime<Utc>>,
    pub updated_at_lte: Option<DateTime<Utc>>,
}

impl LicenseConclusionQuery {
    pub fn filter(&self) -> LicenseConclusionFilter {
        LicenseConclusionFilter {
            purl: self.purl.clone(),
            context_purl: text(self.context_purl.clone(), self.context_purl_strict),
            username: text(self.username.clone(), self.username_strict),
            detected_license: text(self.detected_license.clone(), None),
            concluded_license: text(self.concluded_license.clone(), None),
            comment: text(self.comment.clone(), None),
            has_bulk_conclusion: self.has_bulk_conclusion,
            created_at: range(self.created_at_gte, self.created_at_lte),
            updated_at: range(self.updated_at_gte, self.updated_at_lte),
        }
    }

    pub fn into_list(self) -> ApiResult<ListQuery<LicenseConclusionFilter, LicenseConclusionSortBy>> {
        Ok(ListQuery {
            filter: self.filter(),
            sort_by: self.sort_by,
            sort_order: self.sort_order.unwrap_or_default(),
            pagination: pagination(self.page_index, self.page_size)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BulkConclusionQuery {
    pub page_index: Option<u32>,
    pub page_size: Option<u32>,
    #[param(value_type = Option<String>, example = "pattern")]
    pub sort_by: Option<BulkConclusionSortBy>,
    #[param(value_type = Option<String>, example = "asc")]
    pub sort_order: Option<SortOrder>,
    /// Bulk conclusions with a conclusion on content of this package
    pub purl: Option<String>,
    pub context_purl: Option<String>,
    pub context_purl_strict: Option<bool>,
    pub username: Option<String>,
    pub username_strict: Option<bool>,
    pub pattern: Option<String>,
    pub detected_license: Option<String>,
    pub concluded_license: Option<String>,
    pub comment: Option<String>,
    pub created_at_gte: Option<DateTime<Utc>>,
    pub created_at_lte: Option<DateTime<Utc>>,
    pub updated_at_gte: Option<DateTime<Utc>>,
    pub updated_at_lte: Option<DateTime<Utc>>,
}

impl BulkConclusionQuery {
    pub fn filter(&self) -> BulkConclusionFilter {
        BulkConclusionFilter {
            purl: self.purl.clone(),
            context_purl: text(self.context_purl.clone(), self.context_purl_strict),
            username: text(self.username.clone(), self.username_strict),
            pattern: text(self.pattern.clone(), None),
            detected_license: text(self.detected_license.clone(), None),
            concluded_license: text(self.concluded_license.clone(), None),
            comment: text(self.comment.clone(), None),
            created_at: range(self.created_at_gte, self.created_at_lte),
            updated_at: range(self.updated_at_gte, self.updated_at_lte),
        }
    }

    pub fn into_list(self) -> ApiResult<ListQuery<BulkConclusionFilter, BulkConclusionSortBy>> {
        Ok(ListQuery {
            filter: self.filter(),
            sort_by: self.sort_by,
            sort_order: self.sort_order.unwrap_or_default(),
            pagination: pagination(self.page_index, self.page_size)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PathExclusionQuery {
    pub page_index: Option<u32>,
    pub page_size: Option<u32>,
    #[param(value_type = Option<String>, example = "reason")]
    pub sort_by: Option<PathExclusionSortBy>,
    #[param(value_type = Option<String>, example = "asc")]
    pub sort_order: Option<SortOrder>,
    pub purl: Option<String>,
    pub purl_strict: Option<bool>,
    pub username: Option<String>,
    pub username_strict: Option<bool>,
    pub pattern: Option<String>,
    #[param(value_type = Option<String>, example = "TEST_OF")]
    pub reason: Option<PathExclusionReason>,
    pub comment: Option<String>,
    pub created_at_gte: Option<DateTime<Utc>>,
    pub created_at_lte: Option<DateTime<Utc>>,
    pub updated_at_gte: Option<DateTime<Utc>>,
    pub updated_at_lte: Option<DateTime<Utc>>,
}

impl PathExclusionQuery {
    pub fn filter(&self) -> PathExclusionFilter {
        PathExclusionFilter {
            purl: text(self.purl.clone(), self.purl_strict),
            username: text(self.username.clone(), self.username_strict),
            pattern: text(self.pattern.clone(), None),
            reason: self.reason,
            comment: text(self.comment.clone(), None),
            created_at: range(self.created_at_gte, self.created_at_lte),
            updated_at: range(self.updated_at_gte, self.updated_at_lte),
        }
    }

    pub fn into_list(self) -> ApiResult<ListQuery<PathExclusionFilter, PathExclusionSortBy>> {
        Ok(ListQuery {
            filter: self.filter(),
            sort_by: self.sort_by,
            sort_order: self.sort_order.unwrap_or_default(),
            pagination: pagination(self.page_index, self.page_size)?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PackageQuery {
    pub page_index: Option<u32>,
    pub page_size: Option<u32>,
    #[param(value_type = Option<String>, example = "name")]
    pub sort_by: Option<PackageSortBy>,
    #[param(value_type = Option<String>, example = "asc")]
    pub sort_order: Option<SortOrder>,
    pub purl: Option<String>,
    pub purl_strict: Option<bool>,
    #[serde(rename = "type")]
    pub package_type: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    #[param(value_type = Option<String>, example = "scanned")]
    pub scan_status: Option<ScanStatus>,
    pub created_at_gte: Option<DateTime<Utc>>,
    pub created_at_lte: Option<DateTime<Utc>>,
    pub updated_at_gte: Option<DateTime<Utc>>,
    pub updated_at_lte: Option<DateTime<Utc>>,
}

impl PackageQuery {
    pub fn filter(&self) -> PackageFilter {
        PackageFilter {
            purl: text(self.purl.clone(), self.purl_strict),
            package_type: text(self.package_type.clone(), Some(true)),
            namespace: text(self.namespace.clone(), None),
            name: text(self.name.clone(), None),
            version: text(self.version.clone(), None),
            scan_status: self.scan_status,
            created_at: range(self.created_at_gte, self.created_at_lte),
            updated_at: range(self.updated_at_gte, self.updated_at_lte),
        }
    }

    pub fn into_list(self) -> ApiResult<ListQuery<PackageFilter, PackageSortBy>> {
        Ok(ListQuery {
            filter: self.filter(),
            sort_by: self.sort_by,
            sort_order: self.sort_order.unwrap_or_default(),
            pagination: pagination(self.page_index, self.page_size)?,
        })
    }
}

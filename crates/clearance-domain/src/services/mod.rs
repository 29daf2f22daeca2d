//! Domain services
//!
//! Business rules that span several repositories. Every service is a thin
//! handle over [`Repositories`](crate::Repositories) and is cheap to clone.

pub mod aggregation;
pub mod bulk;
pub mod cleanup;
pub mod curation;
pub mod ingestion;
pub mod jobs;

pub use aggregation::{
    ConfiguredConclusion, ConfiguredExclusion, CopyrightResult, IssueResult, LicenseResult,
    Location, PackageConfiguration, ResultAggregator, ResultStatus, ScanResults,
    ScanResultsOutcome,
};
pub use bulk::{AdditionalMatch, AffectedFiles, BulkConclusionService, BulkCreated, BulkUpdated};
pub use cleanup::{CleanupBookmark, CleanupOptions, CleanupReport, PurlCleanup};
pub use curation::CurationService;
pub use ingestion::ScanIngestor;
pub use jobs::JobService;

use crate::{
    errors::{DomainError, DomainResult},
    spdx::SpdxExpression,
};

/// Validate an SPDX expression reported against `field`
pub(crate) fn check_spdx(field: &str, expression: &str) -> DomainResult<()> {
    SpdxExpression::validate(expression).map_err(|e| e.at_field(field))
}

/// Validate an optional SPDX expression
pub(crate) fn check_opt_spdx(field: &str, expression: Option<&str>) -> DomainResult<()> {
    match expression {
        Some(expression) => check_spdx(field, expression),
        None => Ok(()),
    }
}

pub(crate) fn require_owner(
    actor: &crate::entities::Actor,
    owner_id: i64,
    what: &str,
) -> DomainResult<()> {
    if actor.can_modify(owner_id) {
        Ok(())
    } else {
        Err(DomainError::forbidden(format!(
            "only the creator or an admin can modify this {}",
            what
        )))
    }
}

//! Single license conclusions and path exclusions

use tracing::info;

use super::{check_opt_spdx, check_spdx, require_owner};
use crate::{
    entities::{
        Actor, LicenseConclusion, LicenseConclusionChanges, NewLicenseConclusion,
        NewPathExclusion, PathExclusion, PathExclusionChanges,
    },
    errors::{DomainError, DomainResult},
    pattern::PathPattern,
    purl::Purl,
    repositories::Repositories,
    value_objects::Sha256Digest,
};

#[derive(Clone)]
pub struct CurationService {
    repos: Repositories,
}

impl CurationService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create_license_conclusion(
        &self,
        mut new: NewLicenseConclusion,
    ) -> DomainResult<LicenseConclusion> {
        check_spdx(
            "concludedLicenseExpressionSPDX",
            &new.concluded_license_expression_spdx,
        )?;
        check_opt_spdx(
            "detectedLicenseExpressionSPDX",
            new.detected_license_expression_spdx.as_deref(),
        )?;
        Purl::parse(&new.context_purl).map_err(|e| e.at_field("contextPurl"))?;
        let sha256 = Sha256Digest::parse(&new.file_sha256).map_err(|e| e.at_field("fileSha256"))?;

        if self.repos.files.find(sha256.as_str()).await?.is_none() {
            return Err(DomainError::not_found("File", sha256));
        }
        new.file_sha256 = sha256.into();
        new.bulk_conclusion_id = None;

        let conclusion = self.repos.license_conclusions.create(new).await?;
        info!(
            license_conclusion_id = conclusion.id,
            file_sha256 = %conclusion.file_sha256,
            "Created license conclusion"
        );
        Ok(conclusion)
    }

    pub async fn update_license_conclusion(
        &self,
        actor: &Actor,
        id: i64,
        changes: &LicenseConclusionChanges,
    ) -> DomainResult<LicenseConclusion> {
        self.editable_conclusion(actor, id).await?;
        if let Some(concluded) = &changes.concluded_license_expression_spdx {
            check_spdx("concludedLicenseExpressionSPDX", concluded)?;
        }
        if let Some(detected) = &changes.detected_license_expression_spdx {
            check_opt_spdx("detectedLicenseExpressionSPDX", detected.as_deref())?;
        }
        self.repos.license_conclusions.update(id, changes).await
    }

    pub async fn delete_license_conclusion(&self, actor: &Actor, id: i64) -> DomainResult<()> {
        self.editable_conclusion(actor, id).await?;
        self.repos.license_conclusions.delete(id).await?;
        info!(license_conclusion_id = id, "Deleted license conclusion");
        Ok(())
    }

    /// Bulk-owned conclusions are managed through their bulk conclusion
    async fn editable_conclusion(&self, actor: &Actor, id: i64) -> DomainResult<LicenseConclusion> {
        let conclusion = self
            .repos
            .license_conclusions
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("LicenseConclusion", id))?;
        require_owner(actor, conclusion.user_id, "license conclusion")?;
        if let Some(bulk_id) = conclusion.bulk_conclusion_id {
            return Err(DomainError::rule(format!(
                "license conclusion {} belongs to bulk conclusion {}; change the bulk conclusion instead",
                id, bulk_id
            )));
        }
        Ok(conclusion)
    }

    pub async fn create_path_exclusion(
        &self,
        mut new: NewPathExclusion,
    ) -> DomainResult<PathExclusion> {
        Purl::parse(&new.purl)?;
        let pattern = PathPattern::new(&new.pattern)?;
        new.pattern = pattern.as_str().to_string();

        let exclusion = self.repos.path_exclusions.create(new).await?;
        info!(path_exclusion_id = exclusion.id, purl = %exclusion.purl, "Created path exclusion");
        Ok(exclusion)
    }

    pub async fn update_path_exclusion(
        &self,
        actor: &Actor,
        id: i64,
        mut changes: PathExclusionChanges,
    ) -> DomainResult<PathExclusion> {
        let exclusion = self.path_exclusion(id).await?;
        require_owner(actor, exclusion.user_id, "path exclusion")?;
        if let Some(pattern) = &changes.pattern {
            changes.pattern = Some(PathPattern::new(pattern)?.as_str().to_string());
        }
        self.repos.path_exclusions.update(id, &changes).await
    }

    pub async fn delete_path_exclusion(&self, actor: &Actor, id: i64) -> DomainResult<()> {
        let exclusion = self.path_exclusion(id).await?;
        require_owner(actor, exclusion.user_id, "path exclusion")?;
        self.repos.path_exclusions.delete(id).await?;
        info!(path_exclusion_id = id, "Deleted path exclusion");
        Ok(())
    }

    async fn path_exclusion(&self, id: i64) -> DomainResult<PathExclusion> {
        self.repos
            .path_exclusions
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("PathExclusion", id))
    }
}

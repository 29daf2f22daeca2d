//! License conclusions and bulk conclusions

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use clearance_domain::{
    entities::{
        BulkConclusion, BulkConclusionChanges, LicenseConclusion, LicenseConclusionChanges,
        NewBulkConclusion, NewLicenseConclusion,
    },
    errors::DomainResult,
    query::{
        sort_records, BulkConclusionFilter, BulkConclusionSortBy, LicenseConclusionFilter,
        LicenseConclusionSortBy, ListQuery, SortKey,
    },
    repositories::{BulkConclusionRepository, BulkWrite, LicenseConclusionRepository},
};

use super::{next, InMemoryStore, StoreState};
use crate::error::PersistenceError;

fn insert_conclusion(
    state: &mut StoreState,
    new: NewLicenseConclusion,
    now: DateTime<Utc>,
) -> LicenseConclusion {
    let id = next(&mut state.sequences.license_conclusion);
    let conclusion = LicenseConclusion {
        id,
        concluded_license_expression_spdx: new.concluded_license_expression_spdx,
        detected_license_expression_spdx: new.detected_license_expression_spdx,
        comment: new.comment,
        local: new.local,
        context_purl: new.context_purl,
        file_sha256: new.file_sha256,
        user_id: new.user_id,
        bulk_conclusion_id: new.bulk_conclusion_id,
        created_at: now,
        updated_at: now,
    };
    state.license_conclusions.insert(id, conclusion.clone());
    conclusion
}

/// Content concluded by a bulk conclusion
fn owned_contents(state: &StoreState, bulk_id: i64) -> BTreeSet<String> {
    state
        .license_conclusions
        .values()
        .filter(|c| c.bulk_conclusion_id == Some(bulk_id))
        .map(|c| c.file_sha256.clone())
        .collect()
}

/// Add conclusions of `bulk` for content it does not conclude yet
fn add_missing(
    state: &mut StoreState,
    bulk: &BulkConclusion,
    sha256s: &[String],
    now: DateTime<Utc>,
) -> usize {
    let owned = owned_contents(state, bulk.id);
    let mut added = 0;
    for sha256 in sha256s.iter().collect::<BTreeSet<_>>() {
        if owned.contains(sha256) {
            continue;
        }
        insert_conclusion(state, bulk.conclusion_for(sha256), now);
        added += 1;
    }
    added
}

fn filtered_conclusions(
    state: &StoreState,
    filter: &LicenseConclusionFilter,
) -> Vec<LicenseConclusion> {
    let contents = filter.purl.as_deref().map(|purl| state.contents_of(purl));
    state
        .license_conclusions
        .values()
        .filter(|c| {
            contents
                .as_ref()
                .map_or(true, |contents| contents.contains(&c.file_sha256))
        })
        .filter(|c| filter.matches(c, state.username(c.user_id)))
        .cloned()
        .collect()
}

fn conclusion_sort_key(
    state: &StoreState,
    c: &LicenseConclusion,
    sort_by: Option<LicenseConclusionSortBy>,
) -> SortKey {
    match sort_by {
        None | Some(LicenseConclusionSortBy::Id) => SortKey::Int(c.id),
        Some(LicenseConclusionSortBy::ContextPurl) => SortKey::text(&c.context_purl),
        Some(LicenseConclusionSortBy::Username) => SortKey::opt_text(state.username(c.user_id)),
        Some(LicenseConclusionSortBy::DetectedLicense) => {
            SortKey::opt_text(c.detected_license_expression_spdx.as_deref())
        }
        Some(LicenseConclusionSortBy::ConcludedLicense) => {
            SortKey::text(&c.concluded_license_expression_spdx)
        }
        Some(LicenseConclusionSortBy::Comment) => SortKey::opt_text(c.comment.as_deref()),
        Some(LicenseConclusionSortBy::Local) => SortKey::Bool(c.local),
        Some(LicenseConclusionSortBy::CreatedAt) => SortKey::Time(c.created_at),
        Some(LicenseConclusionSortBy::UpdatedAt) => SortKey::Time(c.updated_at),
    }
}

#[async_trait]
impl LicenseConclusionRepository for InMemoryStore {
    async fn create(&self, conclusion: NewLicenseConclusion) -> DomainResult<LicenseConclusion> {
        let mut state = self.state.write();
        Ok(insert_conclusion(&mut state, conclusion, Utc::now()))
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<LicenseConclusion>> {
        Ok(self.state.read().license_conclusions.get(&id).cloned())
    }

    async fn update(
        &self,
        id: i64,
        changes: &LicenseConclusionChanges,
    ) -> DomainResult<LicenseConclusion> {
        let mut state = self.state.write();
        let conclusion = state
            .license_conclusions
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::not_found("LicenseConclusion", id))?;
        changes.apply(conclusion, Utc::now());
        Ok(conclusion.clone())
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        let mut state = self.state.write();
        state
            .license_conclusions
            .remove(&id)
            .ok_or_else(|| PersistenceError::not_found("LicenseConclusion", id))?;
        Ok(())
    }

    async fn list(
        &self,
        query: &ListQuery<LicenseConclusionFilter, LicenseConclusionSortBy>,
    ) -> DomainResult<Vec<LicenseConclusion>> {
        let state = self.state.read();
        let mut conclusions = filtered_conclusions(&state, &query.filter);
        sort_records(
            &mut conclusions,
            query.sort_order,
            |c| conclusion_sort_key(&state, c, query.sort_by),
            |c| c.id,
        );
        Ok(query.pagination.apply(conclusions))
    }

    async fn count(&self, filter: &LicenseConclusionFilter) -> DomainResult<u64> {
        let state = self.state.read();
        Ok(filtered_conclusions(&state, filter).len() as u64)
    }

    async fn for_contents(&self, sha256s: &[String]) -> DomainResult<Vec<LicenseConclusion>> {
        let state = self.state.read();
        Ok(state
            .license_conclusions
            .values()
            .filter(|c| sha256s.contains(&c.file_sha256))
            .cloned()
            .collect())
    }

    async fn for_bulk(&self, bulk_id: i64) -> DomainResult<Vec<LicenseConclusion>> {
        let state = self.state.read();
        Ok(state
            .license_conclusions
            .values()
            .filter(|c| c.bulk_conclusion_id == Some(bulk_id))
            .cloned()
            .collect())
    }

    async fn reassign_context(&self, from: &str, to: &str) -> DomainResult<u64> {
        let mut state = self.state.write();
        let mut moved = 0;
        for conclusion in state.license_conclusions.values_mut() {
            if conclusion.context_purl == from {
                conclusion.context_purl = to.to_string();
                moved += 1;
            }
        }
        Ok(moved)
    }
}

fn filtered_bulks(state: &StoreState, filter: &BulkConclusionFilter) -> Vec<BulkConclusion> {
    let touching: Option<BTreeSet<i64>> = filter.purl.as_deref().map(|purl| {
        let contents = state.contents_of(purl);
        state
            .license_conclusions
            .values()
            .filter(|c| contents.contains(&c.file_sha256))
            .filter_map(|c| c.bulk_conclusion_id)
            .collect()
    });
    state
        .bulk_conclusions
        .values()
        .filter(|b| touching.as_ref().map_or(true, |ids| ids.contains(&b.id)))
        .filter(|b| filter.matches(b, state.username(b.user_id)))
        .cloned()
        .collect()
}

fn bulk_sort_key(
    state: &StoreState,
    b: &BulkConclusion,
    sort_by: Option<BulkConclusionSortBy>,
) -> SortKey {
    match sort_by {
        None | Some(BulkConclusionSortBy::Id) => SortKey::Int(b.id),
        Some(BulkConclusionSortBy::Pattern) => SortKey::text(&b.pattern),
        Some(BulkConclusionSortBy::ContextPurl) => SortKey::text(&b.context_purl),
        Some(BulkConclusionSortBy::Username) => SortKey::opt_text(state.username(b.user_id)),
        Some(BulkConclusionSortBy::DetectedLicense) => {
            SortKey::opt_text(b.detected_license_expression_spdx.as_deref())
        }
        Some(BulkConclusionSortBy::ConcludedLicense) => {
            SortKey::text(&b.concluded_license_expression_spdx)
        }
        Some(BulkConclusionSortBy::Comment) => SortKey::opt_text(b.comment.as_deref()),
        Some(BulkConclusionSortBy::CreatedAt) => SortKey::Time(b.created_at),
        Some(BulkConclusionSortBy::UpdatedAt) => SortKey::Time(b.updated_at),
    }
}

#[async_trait]
impl BulkConclusionRepository for InMemoryStore {
    async fn create(&self, bulk: NewBulkConclusion, sha256s: &[String]) -> DomainResult<BulkWrite> {
        let mut state = self.state.write();
        let now = Utc::now();
        let id = next(&mut state.sequences.bulk_conclusion);
        let bulk = BulkConclusion {
            id,
            pattern: bulk.pattern,
            concluded_license_expression_spdx: bulk.concluded_license_expression_spdx,
            detected_license_expression_spdx: bulk.detected_license_expression_spdx,
            comment: bulk.comment,
            local: bulk.local,
            context_purl: bulk.context_purl,
            user_id: bulk.user_id,
            created_at: now,
            updated_at: now,
        };
        state.bulk_conclusions.insert(id, bulk.clone());
        let added = add_missing(&mut state, &bulk, sha256s, now);
        Ok(BulkWrite {
            bulk,
            added,
            deleted: 0,
        })
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<BulkConclusion>> {
        Ok(self.state.read().bulk_conclusions.get(&id).cloned())
    }

    async fn update(
        &self,
        id: i64,
        changes: &BulkConclusionChanges,
        sha256s: Option<&[String]>,
    ) -> DomainResult<BulkWrite> {
        let mut state = self.state.write();
        let now = Utc::now();
        let bulk = {
            let bulk = state
                .bulk_conclusions
                .get_mut(&id)
                .ok_or_else(|| PersistenceError::not_found("BulkConclusion", id))?;
            changes.apply(bulk, now);
            bulk.clone()
        };

        let conclusion_changes = changes.conclusion_changes();
        if !conclusion_changes.is_empty() {
            for conclusion in state.license_conclusions.values_mut() {
                if conclusion.bulk_conclusion_id == Some(id) {
                    conclusion_changes.apply(conclusion, now);
                }
            }
        }

        let (mut added, mut deleted) = (0, 0);
        if let Some(sha256s) = sha256s {
            let keep: BTreeSet<&String> = sha256s.iter().collect();
            let before = state.license_conclusions.len();
            state
                .license_conclusions
                .retain(|_, c| c.bulk_conclusion_id != Some(id) || keep.contains(&c.file_sha256));
            deleted = before - state.license_conclusions.len();
            added = add_missing(&mut state, &bulk, sha256s, now);
        }

        Ok(BulkWrite {
            bulk,
            added,
            deleted,
        })
    }

    async fn extend(&self, id: i64, sha256s: &[String]) -> DomainResult<usize> {
        let mut state = self.state.write();
        let bulk = state
            .bulk_conclusions
            .get(&id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found("BulkConclusion", id))?;
        Ok(add_missing(&mut state, &bulk, sha256s, Utc::now()))
    }

    async fn delete(&self, id: i64) -> DomainResult<usize> {
        let mut state = self.state.write();
        state
            .bulk_conclusions
            .remove(&id)
            .ok_or_else(|| PersistenceError::not_found("BulkConclusion", id))?;
        let before = state.license_conclusions.len();
        state
            .license_conclusions
            .retain(|_, c| c.bulk_conclusion_id != Some(id));
        Ok(before - state.license_conclusions.len())
    }

    async fn list(
        &self,
        query: &ListQuery<BulkConclusionFilter, BulkConclusionSortBy>,
    ) -> DomainResult<Vec<BulkConclusion>> {
        let state = self.state.read();
        let mut bulks = filtered_bulks(&state, &query.filter);
        sort_records(
            &mut bulks,
            query.sort_order,
            |b| bulk_sort_key(&state, b, query.sort_by),
            |b| b.id,
        );
        Ok(query.pagination.apply(bulks))
    }

    async fn count(&self, filter: &BulkConclusionFilter) -> DomainResult<u64> {
        let state = self.state.read();
        Ok(filtered_bulks(&state, filter).len() as u64)
    }

    async fn find_all(&self) -> DomainResult<Vec<BulkConclusion>> {
        Ok(self.state.read().bulk_conclusions.values().cloned().collect())
    }

    async fn reassign_context(&self, from: &str, to: &str) -> DomainResult<u64> {
        let mut state = self.state.write();
        let mut moved = 0;
        for bulk in state.bulk_conclusions.values_mut() {
            if bulk.context_purl == from {
                bulk.context_purl = to.to_string();
                moved += 1;
            }
        }
        Ok(moved)
    }
}

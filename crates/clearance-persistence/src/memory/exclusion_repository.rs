//! Path exclusions

use async_trait::async_trait;
use chrono::Utc;

use clearance_domain::{
    entities::{NewPathExclusion, PathExclusion, PathExclusionChanges},
    errors::DomainResult,
    query::{sort_records, ListQuery, PathExclusionFilter, PathExclusionSortBy, SortKey},
    repositories::PathExclusionRepository,
};

use super::{next, InMemoryStore, StoreState};
use crate::error::PersistenceError;

fn filtered(state: &StoreState, filter: &PathExclusionFilter) -> Vec<PathExclusion> {
    state
        .path_exclusions
        .values()
        .filter(|e| filter.matches(e, state.username(e.user_id)))
        .cloned()
        .collect()
}

fn sort_key(state: &StoreState, e: &PathExclusion, sort_by: Option<PathExclusionSortBy>) -> SortKey {
    match sort_by {
        None | Some(PathExclusionSortBy::Id) => SortKey::Int(e.id),
        Some(PathExclusionSortBy::Purl) => SortKey::text(&e.purl),
        Some(PathExclusionSortBy::Pattern) => SortKey::text(&e.pattern),
        Some(PathExclusionSortBy::Reason) => SortKey::text(e.reason.as_str()),
        Some(PathExclusionSortBy::Comment) => SortKey::opt_text(e.comment.as_deref()),
        Some(PathExclusionSortBy::Username) => SortKey::opt_text(state.username(e.user_id)),
        Some(PathExclusionSortBy::CreatedAt) => SortKey::Time(e.created_at),
        Some(PathExclusionSortBy::UpdatedAt) => SortKey::Time(e.updated_at),
    }
}

#[async_trait]
impl PathExclusionRepository for InMemoryStore {
    async fn create(&self, exclusion: NewPathExclusion) -> DomainResult<PathExclusion> {
        let mut state = self.state.write();
        let now = Utc::now();
        let id = next(&mut state.sequences.path_exclusion);
        let exclusion = PathExclusion {
            id,
            purl: exclusion.purl,
            pattern: exclusion.pattern,
            reason: exclusion.reason,
            comment: exclusion.comment,
            user_id: exclusion.user_id,
            created_at: now,
            updated_at: now,
        };
        state.path_exclusions.insert(id, exclusion.clone());
        Ok(exclusion)
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<PathExclusion>> {
        Ok(self.state.read().path_exclusions.get(&id).cloned())
    }

    async fn update(
        &self,
        id: i64,
        changes: &PathExclusionChanges,
    ) -> DomainResult<PathExclusion> {
        let mut state = self.state.write();
        let exclusion = state
            .path_exclusions
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::not_found("PathExclusion", id))?;
        changes.apply(exclusion, Utc::now());
        Ok(exclusion.clone())
    }

    async fn delete(&self, id: i64) -> DomainResult<()> {
        let mut state = self.state.write();
        state
            .path_exclusions
            .remove(&id)
            .ok_or_else(|| PersistenceError::not_found("PathExclusion", id))?;
        Ok(())
    }

    async fn list(
        &self,
        query: &ListQuery<PathExclusionFilter, PathExclusionSortBy>,
    ) -> DomainResult<Vec<PathExclusion>> {
        let state = self.state.read();
        let mut exclusions = filtered(&state, &query.filter);
        sort_records(
            &mut exclusions,
            query.sort_order,
            |e| sort_key(&state, e, query.sort_by),
            |e| e.id,
        );
        Ok(query.pagination.apply(exclusions))
    }

    async fn count(&self, filter: &PathExclusionFilter) -> DomainResult<u64> {
        let state = self.state.read();
        Ok(filtered(&state, filter).len() as u64)
    }

    async fn for_purl(&self, purl: &str) -> DomainResult<Vec<PathExclusion>> {
        let state = self.state.read();
        Ok(state
            .path_exclusions
            .values()
            .filter(|e| e.purl == purl)
            .cloned()
            .collect())
    }

    async fn reassign_context(&self, from: &str, to: &str) -> DomainResult<u64> {
        let mut state = self.state.write();
        let mut moved = 0;
        for exclusion in state.path_exclusions.values_mut() {
            if exclusion.purl == from {
                exclusion.purl = to.to_string();
                moved += 1;
            }
        }
        Ok(moved)
    }
}

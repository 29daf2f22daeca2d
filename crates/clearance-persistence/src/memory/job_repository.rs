//! Scanner jobs

use async_trait::async_trait;

use clearance_domain::{
    entities::ScannerJob, errors::DomainResult, repositories::ScannerJobRepository,
};

use super::InMemoryStore;
use crate::error::PersistenceError;

#[async_trait]
impl ScannerJobRepository for InMemoryStore {
    async fn create(&self, job: &ScannerJob) -> DomainResult<()> {
        let mut state = self.state.write();
        state.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ScannerJob>> {
        Ok(self.state.read().jobs.get(id).cloned())
    }

    async fn update(
        &self,
        id: &str,
        change: &(dyn for<'j> Fn(&'j mut ScannerJob) -> DomainResult<()> + Send + Sync),
    ) -> DomainResult<ScannerJob> {
        let mut state = self.state.write();
        let stored = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| PersistenceError::not_found("ScannerJob", id))?;
        let mut job = stored.clone();
        change(&mut job)?;
        *stored = job.clone();
        Ok(job)
    }

    async fn active_for_package(&self, package_id: i64) -> DomainResult<Option<ScannerJob>> {
        let state = self.state.read();
        Ok(state
            .jobs
            .values()
            .filter(|j| j.status.is_active() && j.package_ids.contains(&package_id))
            .max_by_key(|j| j.created_at)
            .cloned())
    }
}

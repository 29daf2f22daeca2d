//! Application state for the API server and the scanner-agent service

use std::{collections::HashMap, sync::Arc, time::Instant};

use clearance_config::AppConfig;
use clearance_domain::{
    services::{
        BulkConclusionService, CurationService, JobService, PurlCleanup, ResultAggregator,
        ScanIngestor,
    },
    Repositories,
};
use clearance_scanner::{JobQueue, ScanDispatcher};

use crate::{auth::AgentTokenSource, error::ApiResult, signing::UploadSigner};

/// Shown for curation records whose author was deleted
pub const DELETED_USER: &str = "[deleted]";

/// Application state shared across all API handlers
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub config: Arc<AppConfig>,
    /// Where scan work goes: the in-process queue or a remote agent
    pub dispatcher: Arc<dyn ScanDispatcher>,
    pub signer: UploadSigner,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        config: AppConfig,
        dispatcher: Arc<dyn ScanDispatcher>,
    ) -> Self {
        let signer = UploadSigner::new(
            &config.storage.signing_secret,
            config.storage.upload_url_ttl_secs,
            &config.server.public_url(),
        );
        Self {
            repos,
            config: Arc::new(config),
            dispatcher,
            signer,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn jobs(&self) -> JobService {
        JobService::new(self.repos.clone())
    }

    pub fn ingestor(&self) -> ScanIngestor {
        ScanIngestor::new(self.repos.clone())
    }

    pub fn aggregator(&self) -> ResultAggregator {
        ResultAggregator::new(self.repos.clone())
    }

    pub fn curation(&self) -> CurationService {
        CurationService::new(self.repos.clone())
    }

    pub fn bulk(&self) -> BulkConclusionService {
        BulkConclusionService::new(self.repos.clone())
    }

    pub fn cleanup(&self) -> PurlCleanup {
        PurlCleanup::new(self.repos.clone())
    }

    /// Username of every user by id
    pub async fn usernames(&self) -> ApiResult<HashMap<i64, String>> {
        Ok(self
            .repos
            .users
            .list()
            .await?
            .into_iter()
            .map(|user| (user.id, user.username))
            .collect())
    }

    pub async fn username(&self, user_id: i64) -> ApiResult<String> {
        Ok(self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .map_or_else(|| DELETED_USER.to_string(), |user| user.username))
    }
}

impl AgentTokenSource for AppState {
    fn agent_token(&self) -> &str {
        &self.config.scanner_agent.token
    }
}

/// Look up a username, falling back to the deleted-user placeholder
pub fn username_of(usernames: &HashMap<i64, String>, user_id: i64) -> String {
    usernames
        .get(&user_id)
        .cloned()
        .unwrap_or_else(|| DELETED_USER.to_string())
}

/// State of the standalone scanner-agent service
#[derive(Clone)]
pub struct AgentState {
    pub queue: JobQueue,
    pub token: Arc<str>,
}

impl AgentState {
    pub fn new(queue: JobQueue, token: &str) -> Self {
        Self {
            queue,
            token: Arc::from(token),
        }
    }
}

impl AgentTokenSource for AgentState {
    fn agent_token(&self) -> &str {
        &self.token
    }
}

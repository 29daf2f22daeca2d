//! Service startup: the API server and the standalone scanner agent

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::TcpListener;
use tracing::{info, warn};

use clearance_config::AppConfig;
use clearance_domain::{
    entities::{JobStatus, NewUser, Role, ScanReport},
    Repositories,
};
use clearance_persistence::{load_store, save_store, InMemoryStore};
use clearance_scanner::{
    AgentClient, ClientConfig, EmbeddedDispatcher, EmbeddedReporter, HttpDispatcher,
    HttpReporter, JobQueue, JobReporter, QueueConfig, ScanDispatcher, ScanWorker,
};

use crate::{
    auth::hash_password,
    routes::{agent_router, api_router},
    state::{AgentState, AppState},
};

/// Reporter for the in-process agent: writes into the domain, then tells
/// the queue the results were saved
struct SavingReporter {
    inner: EmbeddedReporter,
    queue: Arc<OnceLock<JobQueue>>,
}

#[async_trait]
impl JobReporter for SavingReporter {
    async fn report_state(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> clearance_scanner::Result<()> {
        self.inner.report_state(job_id, status, message).await
    }

    async fn report_results(
        &self,
        job_id: &str,
        agent_job_id: &str,
        report: ScanReport,
    ) -> clearance_scanner::Result<()> {
        self.inner
            .report_results(job_id, agent_job_id, report)
            .await?;

        if let Some(queue) = self.queue.get() {
            if let Err(e) = queue.mark_saved(agent_job_id) {
                warn!(job_id, agent_job_id = %agent_job_id, error = %e, "Could not acknowledge saved results");
            }
        }
        Ok(())
    }
}

fn queue_config(config: &AppConfig) -> QueueConfig {
    QueueConfig {
        workers: config.scanner_agent.workers,
        capacity: config.scanner_agent.queue_capacity,
    }
}

/// Start a job queue scanning inside this process
pub fn embedded_dispatcher(repos: &Repositories, config: &AppConfig) -> Arc<dyn ScanDispatcher> {
    let slot = Arc::new(OnceLock::new());
    let reporter = SavingReporter {
        inner: EmbeddedReporter::new(repos.clone()),
        queue: Arc::clone(&slot),
    };
    let worker = ScanWorker::new(Arc::new(reporter));
    let queue = JobQueue::start(queue_config(config), Arc::new(worker));
    let _ = slot.set(queue.clone());
    Arc::new(EmbeddedDispatcher::new(queue))
}

/// Application state wired to the dispatcher the configuration asks for
pub fn build_state(repos: Repositories, config: AppConfig) -> Result<AppState> {
    let dispatcher: Arc<dyn ScanDispatcher> = match &config.scanner_agent.url {
        Some(url) => {
            info!(url = %url, "Dispatching scans to a remote scanner agent");
            let client = AgentClient::new(url, &config.scanner_agent.token, ClientConfig::default())
                .context("invalid scanner_agent.url")?;
            Arc::new(HttpDispatcher::new(Arc::new(client)))
        }
        None => {
            info!(workers = config.scanner_agent.workers, "Scanning in-process");
            embedded_dispatcher(&repos, &config)
        }
    };
    Ok(AppState::new(repos, config, dispatcher))
}

/// Create the configured admin account if no user has that name yet
pub async fn bootstrap_admin(repos: &Repositories, config: &AppConfig) -> Result<()> {
    let (Some(username), Some(password)) = (
        &config.auth.bootstrap_admin_username,
        &config.auth.bootstrap_admin_password,
    ) else {
        if repos.users.list().await?.is_empty() {
            warn!("No users exist and no bootstrap admin is configured");
        }
        return Ok(());
    };

    if repos.users.find_by_username(username).await?.is_some() {
        return Ok(());
    }
    let password_hash = hash_password(password)?;
    let user = repos
        .users
        .create(NewUser {
            username: username.clone(),
            password_hash,
            role: Role::Admin,
        })
        .await?;
    info!(user_id = user.id, username = %user.username, "Created bootstrap admin");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

fn open_store(config: &AppConfig) -> Result<Arc<InMemoryStore>> {
    let store = match &config.storage.snapshot_path {
        Some(path) => load_store(path)
            .with_context(|| format!("failed to load snapshot {}", path.display()))?,
        None => InMemoryStore::new(),
    };
    Ok(Arc::new(store))
}

/// Run the API server until Ctrl-C
pub async fn serve(config: AppConfig) -> Result<()> {
    std::fs::create_dir_all(&config.storage.upload_dir)
        .with_context(|| format!("cannot create {}", config.storage.upload_dir.display()))?;
    std::fs::create_dir_all(&config.storage.work_dir)
        .with_context(|| format!("cannot create {}", config.storage.work_dir.display()))?;

    let store = open_store(&config)?;
    let repos = Repositories::from_store(Arc::clone(&store));
    bootstrap_admin(&repos, &config).await?;

    let addr = config.server.bind_addr();
    let snapshot_path = config.storage.snapshot_path.clone();
    let state = build_state(repos, config)?;
    let app = api_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!(addr = %addr, "Clearance API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(path) = snapshot_path {
        save_store(&store, &path)
            .with_context(|| format!("failed to save snapshot {}", path.display()))?;
    }
    Ok(())
}

/// Run the standalone scanner agent until Ctrl-C
pub async fn run_agent(config: AppConfig) -> Result<()> {
    let api_url = config
        .scanner_agent
        .api_url
        .as_deref()
        .context("scanner_agent.api_url must be set to run the agent")?;
    let client = AgentClient::new(api_url, &config.scanner_agent.token, ClientConfig::default())
        .context("invalid scanner_agent.api_url")?;

    let worker = ScanWorker::new(Arc::new(HttpReporter::new(Arc::new(client))));
    let queue = JobQueue::start(queue_config(&config), Arc::new(worker));
    let app = agent_router(AgentState::new(queue, &config.scanner_agent.token));

    let addr = config.scanner_agent.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!(addr = %addr, api_url, "Scanner agent listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

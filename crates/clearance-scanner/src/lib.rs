//! Clearance scanner agent
//!
//! Pieces of the agent that scans uploaded package sources:
//!
//! - [`JobQueue`]: bounded queue drained by a pool of worker tasks
//! - [`ScanWorker`]: scans a job directory ([`scan::scan_directory`]) and
//!   reports through a [`JobReporter`]
//! - [`archive`]: safe unpacking of uploaded `.tar.gz` archives
//! - [`ScanDispatcher`]: how the API queues work, in-process or over HTTP
//!
//! The HTTP implementations share [`AgentClient`], a reqwest client with the
//! scanner-agent bearer token and retry on transient failures.

pub mod archive;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod reporter;
pub mod retry;
pub mod scan;
pub mod worker;

pub use client::AgentClient;
pub use config::ClientConfig;
pub use dispatcher::{EmbeddedDispatcher, HttpDispatcher, ScanDispatcher};
pub use error::{Result, ScannerError};
pub use queue::{JobProcessor, JobQueue, QueueConfig, QueuedJob};
pub use reporter::{EmbeddedReporter, HttpReporter, JobReporter};
pub use retry::Backoff;
pub use worker::ScanWorker;

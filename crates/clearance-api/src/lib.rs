//! Clearance REST API
//!
//! HTTP surface of the license clearance server: authentication, scanner
//! jobs, scan results and curation (license conclusions, bulk conclusions
//! and path exclusions). [`routes::api_router`] builds the application;
//! [`server`] wires it to storage and the scanner agent.

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod signing;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::{agent_router, api_router, ApiDoc};
pub use state::{AgentState, AppState};

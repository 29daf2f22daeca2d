//! API request and response models
//!
//! Field names are camelCase on the wire. Optional fields that must not be
//! `null` use [`non_null`](crate::extract::non_null); nullable fields of
//! partial updates use [`double_option`](crate::extract::double_option).

pub mod auth;
pub mod curation;
pub mod packages;
pub mod queries;
pub mod scanner;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use auth::*;
pub use curation::*;
pub use packages::*;
pub use queries::*;
pub use scanner::*;

/// Error envelope returned by every failing request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human readable description
    pub message: String,
    /// Offending field, for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Number of records matching a filter
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub count: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Server version
    pub version: String,
    /// Uptime in seconds
    pub uptime: u64,
}

/// Author of a curation record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserRef {
    pub username: String,
}

//! Clearance domain layer
//!
//! Entities, value objects and curation services for the license-clearance
//! server. Storage is abstracted behind the traits in [`repositories`]; the
//! services in [`services`] hold the business rules (bulk-conclusion
//! matching, result aggregation, scan ingestion and purl cleanup) and only
//! talk to those traits.

pub mod entities;
pub mod errors;
pub mod pattern;
pub mod purl;
pub mod query;
pub mod repositories;
pub mod services;
pub mod spdx;
pub mod value_objects;

pub use errors::{DomainError, DomainResult};
pub use pattern::PathPattern;
pub use purl::Purl;
pub use repositories::Repositories;
pub use spdx::SpdxExpression;
pub use value_objects::Sha256Digest;

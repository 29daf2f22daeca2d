//! Persistence layer error types

use clearance_domain::errors::DomainError;
use thiserror::Error;

/// Errors that can occur during persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Unique constraint violated
    #[error("Conflict on {field}: {reason}")]
    Conflict { field: &'static str, reason: String },

    /// Snapshot file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot content is not valid JSON for the store
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PersistenceError {
    /// Create a not found error
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create a unique-constraint error
    pub fn conflict(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Conflict {
            field,
            reason: reason.into(),
        }
    }
}

/// Convert persistence errors to domain errors
impl From<PersistenceError> for DomainError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { entity_type, id } => DomainError::EntityNotFound {
                entity_type: entity_type.to_string(),
                id,
            },
            PersistenceError::Conflict { field, reason } => DomainError::validation(field, reason),
            other => DomainError::Storage {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = PersistenceError::not_found("Package", 12);
        assert!(err.to_string().contains("Package"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_error_conversion() {
        let domain: DomainError = PersistenceError::not_found("User", 3).into();
        assert!(matches!(domain, DomainError::EntityNotFound { .. }));

        let domain: DomainError = PersistenceError::conflict("username", "taken").into();
        assert_eq!(domain, DomainError::validation("username", "taken"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let domain: DomainError = PersistenceError::from(io).into();
        assert!(matches!(domain, DomainError::Storage { .. }));
    }
}

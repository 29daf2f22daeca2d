//! Domain errors for Clearance

use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Validation error: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Business rule violation: {rule}")]
    BusinessRuleViolation { rule: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    EntityNotFound { entity_type: String, id: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Storage failure: {reason}")]
    Storage { reason: String },
}

impl DomainError {
    /// Create a validation error for a field
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::EntityNotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a business rule violation
    pub fn rule(rule: impl Into<String>) -> Self {
        Self::BusinessRuleViolation { rule: rule.into() }
    }

    /// Create a permission error
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Re-attribute a validation error to another field.
    ///
    /// Value-object parsers report errors against their own name (`purl`,
    /// `pattern`, ...); request handlers use this to point at the field the
    /// value actually came from.
    pub fn at_field(self, field: impl Into<String>) -> Self {
        match self {
            Self::ValidationError { reason, .. } => Self::ValidationError {
                field: field.into(),
                reason,
            },
            other => other,
        }
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_field_rewrites_validation_errors() {
        let err = DomainError::validation("purl", "missing scheme").at_field("contextPurl");
        assert_eq!(
            err,
            DomainError::ValidationError {
                field: "contextPurl".to_string(),
                reason: "missing scheme".to_string(),
            }
        );
    }

    #[test]
    fn test_at_field_keeps_other_errors() {
        let err = DomainError::not_found("Package", "pkg:npm/a@1").at_field("purl");
        assert!(matches!(err, DomainError::EntityNotFound { .. }));
        assert!(err.to_string().contains("pkg:npm/a@1"));
    }
}

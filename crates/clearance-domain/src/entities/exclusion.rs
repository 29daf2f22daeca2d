//! Path exclusions

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why matched paths are excluded from license consideration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathExclusionReason {
    BuildToolOf,
    DataFileOf,
    DocumentationOf,
    ExampleOf,
    OptionalComponentOf,
    Other,
    ProvidedBy,
    TestOf,
    TestToolOf,
}

impl PathExclusionReason {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildToolOf => "BUILD_TOOL_OF",
            Self::DataFileOf => "DATA_FILE_OF",
            Self::DocumentationOf => "DOCUMENTATION_OF",
            Self::ExampleOf => "EXAMPLE_OF",
            Self::OptionalComponentOf => "OPTIONAL_COMPONENT_OF",
            Self::Other => "OTHER",
            Self::ProvidedBy => "PROVIDED_BY",
            Self::TestOf => "TEST_OF",
            Self::TestToolOf => "TEST_TOOL_OF",
        }
    }
}

impl fmt::Display for PathExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule removing matched paths of a package from scan consideration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathExclusion {
    pub id: i64,
    pub purl: String,
    pub pattern: String,
    pub reason: PathExclusionReason,
    pub comment: Option<String>,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a path exclusion before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewPathExclusion {
    pub purl: String,
    pub pattern: String,
    pub reason: PathExclusionReason,
    pub comment: Option<String>,
    pub user_id: i64,
}

/// Partial update of a path exclusion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathExclusionChanges {
    pub pattern: Option<String>,
    pub reason: Option<PathExclusionReason>,
    pub comment: Option<Option<String>>,
}

impl PathExclusionChanges {
    /// Whether no field would change
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none() && self.reason.is_none() && self.comment.is_none()
    }

    /// Apply the changes in place
    pub fn apply(&self, exclusion: &mut PathExclusion, now: DateTime<Utc>) {
        if let Some(pattern) = &self.pattern {
            exclusion.pattern = pattern.clone();
        }
        if let Some(reason) = self.reason {
            exclusion.reason = reason;
        }
        if let Some(comment) = &self.comment {
            exclusion.comment = comment.clone();
        }
        exclusion.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_wire_names_match_serde() {
        for reason in [
            PathExclusionReason::BuildToolOf,
            PathExclusionReason::OptionalComponentOf,
            PathExclusionReason::TestToolOf,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn test_unknown_reason_rejected() {
        assert!(serde_json::from_str::<PathExclusionReason>("\"VENDORED\"").is_err());
    }
}

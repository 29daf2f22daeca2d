//! Value objects representing immutable domain concepts

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

/// Lowercase hex SHA-256 digest identifying file content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Parse a 64-character hex digest
    pub fn parse(input: &str) -> DomainResult<Self> {
        let digest = input.trim();
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::validation(
                "sha256",
                "expected 64 hexadecimal characters",
            ));
        }
        Ok(Self(digest.to_ascii_lowercase()))
    }

    /// Digest text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sha256Digest> for String {
    fn from(value: Sha256Digest) -> Self {
        value.0
    }
}

/// Validate a username: 3-50 characters of letters, digits, `_`, `.` or `-`
pub fn validate_username(username: &str) -> DomainResult<()> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(DomainError::validation(
            "username",
            "username must be between 3 and 50 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(DomainError::validation(
            "username",
            "username can only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

/// Validate a relative file-tree path
pub fn validate_tree_path(path: &str) -> DomainResult<()> {
    if path.is_empty() {
        return Err(DomainError::validation("path", "path cannot be empty"));
    }
    if path.starts_with('/') {
        return Err(DomainError::validation("path", "path must be relative"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(DomainError::validation("path", "path cannot contain '..'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855";

    #[test]
    fn test_digest_is_normalised() {
        let digest = Sha256Digest::parse(DIGEST).unwrap();
        assert_eq!(digest.as_str(), DIGEST.to_ascii_lowercase());
    }

    #[test]
    fn test_digest_rejects_bad_input() {
        assert!(Sha256Digest::parse("abc").is_err());
        assert!(Sha256Digest::parse(&"g".repeat(64)).is_err());
        assert!(serde_json::from_str::<Sha256Digest>("\"xyz\"").is_err());
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.b-c_d").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(51)).is_err());
    }

    #[test]
    fn test_tree_path_rules() {
        assert!(validate_tree_path("src/lib.rs").is_ok());
        assert!(validate_tree_path("").is_err());
        assert!(validate_tree_path("/etc/passwd").is_err());
        assert!(validate_tree_path("a/../b").is_err());
    }
}

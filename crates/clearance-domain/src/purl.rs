//! Package URL value object
//!
//! Parses identifiers of the form
//! `pkg:type/namespace/name@version?qualifiers#subpath`. The original text is
//! kept as the canonical key so that a purl round-trips unchanged through
//! storage and the API.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};

/// A parsed package URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Purl {
    raw: String,
    package_type: String,
    namespace: Option<String>,
    name: String,
    version: Option<String>,
    qualifiers: Option<String>,
    subpath: Option<String>,
}

impl Purl {
    /// Parse a package URL
    pub fn parse(input: &str) -> DomainResult<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(invalid("purl cannot be empty"));
        }

        let (rest, subpath) = match raw.split_once('#') {
            Some((rest, subpath)) => (rest, non_empty(decode(subpath.trim_matches('/'))?)),
            None => (raw, None),
        };
        let (rest, qualifiers) = match rest.split_once('?') {
            Some((rest, qualifiers)) => (rest, non_empty(decode(qualifiers)?)),
            None => (rest, None),
        };

        let Some((scheme, rest)) = rest.split_once(':') else {
            return Err(invalid("missing 'pkg:' scheme"));
        };
        if !scheme.eq_ignore_ascii_case("pkg") {
            return Err(invalid(format!("unsupported scheme '{}'", scheme)));
        }
        let rest = rest.trim_start_matches('/').trim_end_matches('/');

        let Some((package_type, rest)) = rest.split_once('/') else {
            return Err(invalid("missing package type or name"));
        };
        let package_type = package_type.to_ascii_lowercase();
        if !is_valid_type(&package_type) {
            return Err(invalid(format!("invalid package type '{}'", package_type)));
        }

        // A version separator only counts when it follows the last segment
        // boundary, so scoped names like `@babel/core` stay intact.
        let last_slash = rest.rfind('/');
        let (path, version) = match rest.rfind('@') {
            Some(at) if last_slash.map_or(at > 0, |slash| at > slash) => {
                (&rest[..at], non_empty(decode(&rest[at + 1..])?))
            }
            _ => (rest, None),
        };

        let (namespace, name) = match path.rsplit_once('/') {
            Some((namespace, name)) => (non_empty(decode(namespace)?), decode(name)?),
            None => (None, decode(path)?),
        };
        if name.is_empty() {
            return Err(invalid("package name cannot be empty"));
        }

        Ok(Self {
            raw: raw.to_string(),
            package_type,
            namespace,
            name,
            version,
            qualifiers,
            subpath,
        })
    }

    /// The purl text as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Package type (`npm`, `maven`, ...)
    pub fn package_type(&self) -> &str {
        &self.package_type
    }

    /// Decoded namespace
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Decoded name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded version
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Decoded qualifier string (`key=value&...`)
    pub fn qualifiers(&self) -> Option<&str> {
        self.qualifiers.as_deref()
    }

    /// Decoded subpath
    pub fn subpath(&self) -> Option<&str> {
        self.subpath.as_deref()
    }

    /// The purl text without qualifiers and subpath
    pub fn without_qualifiers(&self) -> &str {
        self.raw
            .split(['?', '#'])
            .next()
            .unwrap_or(self.raw.as_str())
    }

    /// Whether two purls name the same package, ignoring version and qualifiers
    pub fn same_package(&self, other: &Purl) -> bool {
        self.package_type == other.package_type
            && self.namespace == other.namespace
            && self.name == other.name
    }
}

impl fmt::Display for Purl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Purl {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Purl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Purl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Purl::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn invalid(reason: impl Into<String>) -> DomainError {
    DomainError::validation("purl", reason)
}

fn decode(segment: &str) -> DomainResult<String> {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| invalid(format!("invalid percent-encoding in '{}'", segment)))
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn is_valid_type(package_type: &str) -> bool {
    let mut chars = package_type.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '+' | '-'))
}

//! Package entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::purl::Purl;

/// Scan status of a package or file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanStatus {
    NotStarted,
    Pending,
    Scanned,
    Failed,
}

impl ScanStatus {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::NotStarted => "notStarted",
            ScanStatus::Pending => "pending",
            ScanStatus::Scanned => "scanned",
            ScanStatus::Failed => "failed",
        }
    }
}

/// A software package version identified by its purl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: i64,
    pub purl: String,
    #[serde(rename = "type")]
    pub package_type: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
    pub qualifiers: Option<String>,
    pub subpath: Option<String>,
    pub scan_status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Package {
    /// Build a package record from a parsed purl
    pub fn from_purl(id: i64, purl: &Purl, scan_status: ScanStatus, now: DateTime<Utc>) -> Self {
        Self {
            id,
            purl: purl.as_str().to_string(),
            package_type: purl.package_type().to_string(),
            namespace: purl.namespace().map(str::to_string),
            name: purl.name().to_string(),
            version: purl.version().map(str::to_string),
            qualifiers: purl.qualifiers().map(str::to_string),
            subpath: purl.subpath().map(str::to_string),
            scan_status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `other` is another version of the same package
    pub fn is_sibling_of(&self, other: &Package) -> bool {
        self.id != other.id
            && self.package_type == other.package_type
            && self.namespace == other.namespace
            && self.name == other.name
    }
}

/// An alias purl that resolves to an existing package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurlBookmark {
    pub purl: String,
    pub package_id: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_purl_copies_components() {
        let purl = Purl::parse("pkg:npm/%40scope/name@1.0.0?arch=x").unwrap();
        let package = Package::from_purl(7, &purl, ScanStatus::Pending, Utc::now());
        assert_eq!(package.id, 7);
        assert_eq!(package.package_type, "npm");
        assert_eq!(package.namespace.as_deref(), Some("@scope"));
        assert_eq!(package.version.as_deref(), Some("1.0.0"));
        assert_eq!(package.qualifiers.as_deref(), Some("arch=x"));
    }

    #[test]
    fn test_siblings() {
        let now = Utc::now();
        let a = Package::from_purl(1, &Purl::parse("pkg:npm/a@1").unwrap(), ScanStatus::Scanned, now);
        let b = Package::from_purl(2, &Purl::parse("pkg:npm/a@2").unwrap(), ScanStatus::Scanned, now);
        let c = Package::from_purl(3, &Purl::parse("pkg:pypi/a@1").unwrap(), ScanStatus::Scanned, now);
        assert!(a.is_sibling_of(&b));
        assert!(!a.is_sibling_of(&a));
        assert!(!a.is_sibling_of(&c));
    }

    #[test]
    fn test_scan_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ScanStatus::NotStarted).unwrap(),
            "\"notStarted\""
        );
        assert_eq!(ScanStatus::Scanned.as_str(), "scanned");
    }
}

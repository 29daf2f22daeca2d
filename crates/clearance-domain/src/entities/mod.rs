//! Domain entities
//!
//! Records persisted by the repositories. Serialized field names are
//! camelCase so the same shapes can be snapshotted to JSON and reused by the
//! HTTP contracts.

pub mod conclusion;
pub mod exclusion;
pub mod file;
pub mod job;
pub mod package;
pub mod scan;
pub mod user;

pub use conclusion::{
    BulkConclusion, BulkConclusionChanges, LicenseConclusion, LicenseConclusionChanges,
    NewBulkConclusion, NewLicenseConclusion,
};
pub use exclusion::{NewPathExclusion, PathExclusion, PathExclusionChanges, PathExclusionReason};
pub use file::{
    CopyrightFinding, File, FileTree, IssueSeverity, LicenseFinding, NewCopyrightFinding,
    NewLicenseFinding, NewScanIssue, ScanIssue,
};
pub use job::{JobStatus, ScannerJob};
pub use package::{Package, PurlBookmark, ScanStatus};
pub use scan::{DetectedCopyright, DetectedLicense, ReportedIssue, ScanReport, ScannedFile, ScannerInfo};
pub use user::{AccessToken, Actor, NewUser, Role, TokenKind, User};

//! License and copyright scanner
//!
//! Walks a directory without following symlinks, hashes every regular file
//! and looks for license and copyright statements in text files:
//!
//! - `SPDX-License-Identifier:` tags, reported with score 100
//! - well-known license notices, reported with score 90
//! - `Copyright ...` / `(c) ...` / `© ...` lines carrying a year
//!
//! Files with a NUL byte in their first 8 KiB are treated as binary: they are
//! hashed but not searched. Files that cannot be read are listed without a
//! hash and produce a warning issue.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use chrono::Utc;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use clearance_domain::{
    entities::{
        DetectedCopyright, DetectedLicense, IssueSeverity, ReportedIssue, ScanReport,
        ScannedFile, ScannerInfo,
    },
    SpdxExpression,
};

use crate::error::{Result, ScannerError};

pub const SCANNER_NAME: &str = "clearance-scanner";
pub const SCANNER_VERSION: &str = env!("CARGO_PKG_VERSION");

const BINARY_SNIFF_LEN: usize = 8 * 1024;
const SPDX_TAG_SCORE: f64 = 100.0;
const NOTICE_SCORE: f64 = 90.0;

/// A license text recognised by its key phrases
struct Notice {
    license: &'static str,
    /// All must appear in the file; the first one anchors the location
    phrases: &'static [&'static str],
    /// None may appear
    unless: &'static [&'static str],
}

const NOTICES: &[Notice] = &[
    Notice {
        license: "MIT",
        phrases: &["permission is hereby granted, free of charge"],
        unless: &[],
    },
    Notice {
        license: "Apache-2.0",
        phrases: &["apache license", "version 2.0"],
        unless: &[],
    },
    Notice {
        license: "GPL-3.0-only",
        phrases: &["gnu general public license", "version 3"],
        unless: &["lesser general public license", "affero"],
    },
    Notice {
        license: "GPL-2.0-only",
        phrases: &["gnu general public license", "version 2"],
        unless: &["lesser general public license", "library general public license"],
    },
    Notice {
        license: "LGPL-2.1-only",
        phrases: &["gnu lesser general public license", "version 2.1"],
        unless: &[],
    },
    Notice {
        license: "LGPL-3.0-only",
        phrases: &["gnu lesser general public license", "version 3"],
        unless: &[],
    },
    Notice {
        license: "BSD-3-Clause",
        phrases: &[
            "redistribution and use in source and binary forms",
            "neither the name",
        ],
        unless: &[],
    },
    Notice {
        license: "BSD-2-Clause",
        phrases: &["redistribution and use in source and binary forms"],
        unless: &["neither the name"],
    },
    Notice {
        license: "ISC",
        phrases: &["permission to use, copy, modify, and/or distribute this software for any purpose"],
        unless: &[],
    },
    Notice {
        license: "MPL-2.0",
        phrases: &["mozilla public license", "version 2.0"],
        unless: &[],
    },
    Notice {
        license: "Unlicense",
        phrases: &["this is free and unencumbered software released into the public domain"],
        unless: &[],
    },
];

fn spdx_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"SPDX-License-Identifier:\s*(.+?)\s*(?:\*/|-->|#\})?\s*$")
            .unwrap_or_else(|e| unreachable!("static regex: {}", e))
    })
}

fn copyright_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)((?:copyright\b|\(c\)|©).*?)\s*(?:\*/|-->)?\s*$")
            .unwrap_or_else(|e| unreachable!("static regex: {}", e))
    })
}

fn year() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:19|20)\d{2}\b").unwrap_or_else(|e| unreachable!("static regex: {}", e))
    })
}

/// Scan `root` and build a report
///
/// Blocking; call from `spawn_blocking` inside async code.
pub fn scan_directory(root: &Path) -> Result<ScanReport> {
    if !root.is_dir() {
        return Err(ScannerError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        )));
    }

    let started_at = Utc::now();
    let mut files = Vec::new();
    let mut issues = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| relative(root, p)).unwrap_or_default();
                warn!(path = %path, error = %e, "Cannot walk entry");
                issues.push(issue(format!("cannot read {}: {}", path, e)));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = relative(root, entry.path());
        match fs::read(entry.path()) {
            Ok(bytes) => files.push(scan_file(path, &bytes)),
            Err(e) => {
                warn!(path = %path, error = %e, "Cannot read file");
                issues.push(issue(format!("cannot read {}: {}", path, e)));
                files.push(ScannedFile {
                    path,
                    sha256: None,
                    license_findings: Vec::new(),
                    copyright_findings: Vec::new(),
                });
            }
        }
    }

    debug!(root = %root.display(), files = files.len(), issues = issues.len(), "Scanned directory");
    Ok(ScanReport {
        scanner: ScannerInfo {
            name: SCANNER_NAME.to_string(),
            version: SCANNER_VERSION.to_string(),
        },
        started_at,
        finished_at: Utc::now(),
        files,
        issues,
    })
}

/// Hash and search the content of one file
pub fn scan_file(path: String, bytes: &[u8]) -> ScannedFile {
    let sha256 = hex::encode(Sha256::digest(bytes));
    if is_binary(bytes) {
        return ScannedFile {
            path,
            sha256: Some(sha256),
            license_findings: Vec::new(),
            copyright_findings: Vec::new(),
        };
    }

    let text = String::from_utf8_lossy(bytes);
    ScannedFile {
        path,
        sha256: Some(sha256),
        license_findings: detect_licenses(&text),
        copyright_findings: detect_copyrights(&text),
    }
}

pub fn is_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

pub fn detect_licenses(text: &str) -> Vec<DetectedLicense> {
    let mut found = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let Some(captures) = spdx_tag().captures(line) else {
            continue;
        };
        let expression = captures[1].trim();
        match SpdxExpression::parse(expression) {
            Ok(parsed) => found.push(DetectedLicense {
                license_expression_spdx: parsed.to_string(),
                start_line: line_number(i),
                end_line: line_number(i),
                score: SPDX_TAG_SCORE,
            }),
            Err(e) => debug!(line = i + 1, expression, error = %e, "Ignoring malformed SPDX tag"),
        }
    }

    let lower = text.to_lowercase();
    for notice in NOTICES {
        if notice.unless.iter().any(|p| lower.contains(p)) {
            continue;
        }
        if !notice.phrases.iter().all(|p| lower.contains(p)) {
            continue;
        }
        let anchor = notice.phrases[0];
        let line = lower
            .lines()
            .position(|l| l.contains(anchor))
            .unwrap_or(0);
        let last = notice
            .phrases
            .iter()
            .filter_map(|p| lower.lines().position(|l| l.contains(p)))
            .max()
            .unwrap_or(line)
            .max(line);
        found.push(DetectedLicense {
            license_expression_spdx: notice.license.to_string(),
            start_line: line_number(line),
            end_line: line_number(last),
            score: NOTICE_SCORE,
        });
    }

    found
}

pub fn detect_copyrights(text: &str) -> Vec<DetectedCopyright> {
    let mut found: Vec<DetectedCopyright> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let Some(captures) = copyright_line().captures(line) else {
            continue;
        };
        let statement = captures[1].trim();
        if !year().is_match(statement) {
            continue;
        }
        if found.iter().any(|c| c.statement == statement) {
            continue;
        }
        found.push(DetectedCopyright {
            statement: statement.to_string(),
            start_line: line_number(i),
            end_line: line_number(i),
        });
    }
    found
}

fn line_number(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

/// `/`-separated path of `path` below `root`
fn relative(root: &Path, path: &Path) -> String {
    let rel: PathBuf = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn issue(message: String) -> ReportedIssue {
    ReportedIssue {
        severity: IssueSeverity::Warning,
        source: SCANNER_NAME.to_string(),
        message,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIT_TEXT: &str = "MIT License\n\nCopyright (c) 2021 Jane Doe\n\n\
        Permission is hereby granted, free of charge, to any person obtaining a copy\n\
        of this software...\n";

    #[test]
    fn test_spdx_tag_is_normalised() {
        let found = detect_licenses("// SPDX-License-Identifier: MIT OR (Apache-2.0)\nfn main() {}\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].license_expression_spdx, "MIT OR Apache-2.0");
        assert_eq!(found[0].start_line, 1);
        assert_eq!(found[0].score, 100.0);
    }

    #[test]
    fn test_spdx_tag_inside_block_comment() {
        let found = detect_licenses("/* SPDX-License-Identifier: GPL-2.0-only */\n");
        assert_eq!(found[0].license_expression_spdx, "GPL-2.0-only");
    }

    #[test]
    fn test_malformed_tag_is_ignored() {
        assert!(detect_licenses("# SPDX-License-Identifier: MIT AND\n").is_empty());
    }

    #[test]
    fn test_notice_detection() {
        let found = detect_licenses(MIT_TEXT);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].license_expression_spdx, "MIT");
        assert_eq!(found[0].start_line, 5);
        assert_eq!(found[0].score, 90.0);
    }

    #[test]
    fn test_bsd_variants_are_told_apart() {
        let two = "Redistribution and use in source and binary forms, with or without\n";
        let three = format!("{}Neither the name of the copyright holder\n", two);
        assert_eq!(detect_licenses(two)[0].license_expression_spdx, "BSD-2-Clause");
        let found = detect_licenses(&three);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].license_expression_spdx, "BSD-3-Clause");
        assert_eq!(found[0].end_line, 2);
    }

    #[test]
    fn test_copyright_needs_a_year() {
        let text = "Copyright (c) 2019-2021 Jane Doe <jane@example.com>\n\
            See the copyright notice below\n\
            /* (C) 2005 ACME Inc. */\n";
        let found = detect_copyrights(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].statement, "Copyright (c) 2019-2021 Jane Doe <jane@example.com>");
        assert_eq!(found[1].statement, "(C) 2005 ACME Inc.");
        assert_eq!(found[1].start_line, 3);
    }

    #[test]
    fn test_binary_files_are_hashed_only() {
        let mut bytes = b"Copyright 2020 Someone\n".to_vec();
        bytes.push(0);
        let file = scan_file("blob.bin".to_string(), &bytes);
        assert!(file.sha256.is_some());
        assert!(file.copyright_findings.is_empty());
    }

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("LICENSE"), MIT_TEXT).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "// SPDX-License-Identifier: ISC\n").unwrap();
        fs::write(dir.path().join("src/empty.txt"), "").unwrap();

        let report = scan_directory(dir.path()).unwrap();
        let paths: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["LICENSE", "src/empty.txt", "src/lib.rs"]);
        assert_eq!(
            report.files[1].sha256.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert_eq!(report.files[2].license_findings[0].license_expression_spdx, "ISC");
        assert_eq!(report.scanner.name, SCANNER_NAME);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_directory(&dir.path().join("absent")).is_err());
    }
}

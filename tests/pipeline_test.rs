//! End-to-end scans over fixture trees
//!
//! Covers the report filtering guarantees, per-file error isolation and
//! run-to-run determinism.

mod common;

use common::*;
use dicom_validator_rs::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

const LEAKY_COMMENT: &str = "0020,4000 LT contact jane@example.org";

/// A structured patient name is reported under protocol 430 at 0.8
#[test]
fn test_patient_name_is_reported() {
    let root = tree(&[(
        "SiteA/1234567/a.dcm",
        &clean_mr_with(&["0010,0010 PN DOE^JOHN"]),
    )]);
    let outcome = scan(root.path(), "simple-scoring", 2);
    let report = Report::from_outcome(&outcome, 0.8);

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].site, "SiteA");
    assert_eq!(report.sites[0].events[0].event, "1234567");
    let file = &report.sites[0].events[0].files[0];
    assert_eq!(file.file, "a.dcm");
    let header = file
        .findings
        .iter()
        .find(|f| f.kind() == FindingKind::Header)
        .expect("header finding");
    assert_eq!(header.score(), 1.0);
    assert!(header.message().contains("PatientName"));
}

/// A clean file contributes nothing to the report
#[test]
fn test_clean_file_is_absent() {
    let root = tree(&[("SiteA/1234567/clean.dcm", CLEAN_MR)]);
    let outcome = scan(root.path(), "simple-scoring", 1);
    assert_eq!(outcome.records.len(), 1);
    assert!(outcome.records[0].findings.is_empty(), "{:?}", outcome.records[0].findings);
    assert!(Report::from_outcome(&outcome, 0.0).is_empty());
}

/// An undecodable file yields exactly one error finding and nothing else
#[test]
fn test_corrupt_file_gives_single_error() {
    let root = tree(&[
        ("SiteA/1234567/broken.dcm", "CORRUPT"),
        ("SiteA/1234567/clean.dcm", CLEAN_MR),
    ]);
    let outcome = scan(root.path(), "simple-scoring", 2);

    let broken = record(&outcome, "broken.dcm");
    assert_eq!(broken.stage, Stage::Failed);
    assert_eq!(broken.findings.len(), 1);
    assert_eq!(broken.findings[0].kind(), FindingKind::Error);
    assert!(record(&outcome, "clean.dcm").findings.is_empty());

    let report = Report::from_outcome(&outcome, 1.0);
    assert_eq!(report.summary.reported_findings, 1);
}

/// A file whose only findings are sub-threshold header findings is omitted
#[test]
fn test_sub_threshold_file_omitted() {
    let root = tree(&[(
        "SiteA/1234567/a.dcm",
        &clean_mr_with(&[LEAKY_COMMENT]),
    )]);
    let outcome = scan(root.path(), "header", 1);
    assert!(Report::from_outcome(&outcome, 0.99).is_empty());
    assert!(!Report::from_outcome(&outcome, 0.5).is_empty());
}

/// Raising the threshold never adds findings
#[test]
fn test_filtering_is_monotonic() {
    let root = tree(&[
        ("SiteA/1234567/name.dcm", &clean_mr_with(&["0010,0010 PN DOE^JOHN"])),
        ("SiteA/1234567/comment.dcm", &clean_mr_with(&[LEAKY_COMMENT])),
        ("SiteB/7654321/bad.dcm", &clean_mr_with(&["0020,000D UI 1..2"])),
        ("SiteB/7654321/broken.dcm", "CORRUPT"),
    ]);
    let outcome = scan(root.path(), "simple-scoring", 2);

    let counts: Vec<usize> = [0.0, 0.25, 0.5, 0.75, 0.8, 0.99, 1.0]
        .iter()
        .map(|&t| Report::from_outcome(&outcome, t).summary.reported_findings)
        .collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]), "{counts:?}");

    // The corrupt file survives even the maximum threshold
    let strictest = Report::from_outcome(&outcome, 1.0);
    assert!(strictest.findings().any(|f| f.kind() == FindingKind::Error));
    assert!(strictest.findings().all(|f| f.kind() == FindingKind::Error));
}

/// A violated requirement is reported as a validation finding
#[test]
fn test_validation_finding_for_bad_uid() {
    let root = tree(&[(
        "SiteA/1234567/a.dcm",
        &clean_mr_with(&["0020,000D UI 1..2"]),
    )]);
    let outcome = scan(root.path(), "accepting", 1);
    let findings = &record(&outcome, "a.dcm").findings;
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind(), FindingKind::Validation);
    assert!(findings[0].message().contains("StudyInstanceUID"));
}

/// MR-only requirements do not apply to other modalities
#[test]
fn test_modality_requirements_follow_modality() {
    let bad_matrix = "0018,1310 US 0\\256\\x\\0";
    let root = tree(&[
        ("SiteA/1234567/mr.dcm", &clean_mr_with(&[bad_matrix])),
        (
            "SiteA/1234567/ct.dcm",
            &clean_mr_with(&[bad_matrix, "0008,0060 CS CT"]),
        ),
    ]);
    let outcome = scan(root.path(), "accepting", 1);
    assert_eq!(record(&outcome, "mr.dcm").findings.len(), 1);
    assert!(record(&outcome, "ct.dcm").findings.is_empty());
}

/// Accepting adds no recognizer findings; rejecting adds exactly one per file
#[test]
fn test_accepting_and_rejecting() {
    let root = tree(&[
        ("SiteA/1234567/a.dcm", CLEAN_MR),
        ("SiteA/1234567/b.dcm", &clean_mr_with(&["0010,0010 PN DOE^JOHN"])),
    ]);

    let accepted = scan(root.path(), "accepting", 2);
    for record in &accepted.records {
        assert!(record
            .findings
            .iter()
            .all(|f| !matches!(f.kind(), FindingKind::Header | FindingKind::Pixels)));
    }

    let rejected = scan(root.path(), "rejecting", 2);
    for record in &rejected.records {
        let header: Vec<_> = record
            .findings
            .iter()
            .filter(|f| f.kind() == FindingKind::Header)
            .collect();
        assert_eq!(header.len(), 1);
        assert_eq!(header[0].score(), 1.0);
    }
}

/// Worker count does not change what is found
#[test]
fn test_concurrency_does_not_change_results() {
    let mut files = Vec::new();
    for i in 0..12 {
        let content = match i % 4 {
            0 => CLEAN_MR.to_string(),
            1 => clean_mr_with(&["0010,0010 PN DOE^JOHN"]),
            2 => clean_mr_with(&[LEAKY_COMMENT]),
            _ => "CORRUPT".to_string(),
        };
        files.push((format!("Site{}/123456{}/f{i:02}.dcm", i % 3, i % 2), content));
    }
    let borrowed: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, c)| (p.as_str(), c.as_str()))
        .collect();
    let root = tree(&borrowed);

    let multiset = |outcome: &ScanOutcome| {
        let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
        for record in &outcome.records {
            for finding in &record.findings {
                *counts
                    .entry((record.file.clone(), finding.message().to_string()))
                    .or_insert(0) += 1;
            }
        }
        counts
    };

    let single = scan(root.path(), "simple-scoring", 1);
    let many = scan(root.path(), "simple-scoring", 4);
    assert_eq!(single.records.len(), 12);
    assert_eq!(multiset(&single), multiset(&many));
}

/// Two runs over the same tree render byte-identical reports
#[test]
fn test_reports_are_reproducible() {
    let root = tree(&[
        ("SiteB/7654321/z.dcm", &clean_mr_with(&["0010,0010 PN ROE^JANE"])),
        ("SiteA/1234567/b.dcm", "CORRUPT"),
        ("SiteA/1234567/a.dcm", &clean_mr_with(&["0010,0010 PN DOE^JOHN", LEAKY_COMMENT])),
        ("loose.dcm", CLEAN_MR),
    ]);
    let first = markdown(&Report::from_outcome(&scan(root.path(), "simple-scoring", 4), 0.5));
    let second = markdown(&Report::from_outcome(&scan(root.path(), "simple-scoring", 3), 0.5));
    assert_eq!(first, second);
    assert!(first.find("Site `SiteA`").unwrap() < first.find("Site `SiteB`").unwrap());
}

/// Files outside the layout become one structural error per folder
#[test]
fn test_stray_files_are_structural_errors() {
    let root = tree(&[
        ("loose1.dcm", CLEAN_MR),
        ("loose2.dcm", CLEAN_MR),
        ("SiteA/notanevent/x.dcm", CLEAN_MR),
        ("SiteA/1234567/a.dcm", CLEAN_MR),
    ]);
    let outcome = scan(root.path(), "simple-scoring", 2);
    assert_eq!(outcome.total_files, 1);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.structural.len(), 2);
    assert!(outcome
        .structural
        .iter()
        .all(|f| f.kind() == FindingKind::Error));
    let folders: Vec<PathBuf> = outcome
        .structural
        .iter()
        .map(|f| f.source_file().to_path_buf())
        .collect();
    assert_eq!(folders, [PathBuf::from("."), PathBuf::from("SiteA/notanevent")]);

    let report = Report::from_outcome(&outcome, 1.0);
    assert_eq!(report.structure.len(), 2);
}

/// Hashed site IDs hide collection folder names
#[test]
fn test_hashed_site_ids() {
    let root = tree(&[("SecretHospital/1234567/a.dcm", "CORRUPT")]);
    let mut config = config(root.path(), "simple-scoring", 1);
    config.site_ids = SiteIdStrategy::Hashed {
        salt: "salt".to_string(),
    };
    let outcome = scan_with(&config);
    let report = Report::from_outcome(&outcome, 0.8);
    assert!(report.sites[0].site.starts_with("site-"));
    assert!(!markdown(&report).contains("SecretHospital/"));
}

/// A file exceeding the per-file timeout becomes an error finding
#[test]
fn test_file_timeout() {
    let root = tree(&[
        ("SiteA/1234567/slow.dcm", "SLEEP"),
        ("SiteA/1234567/fast.dcm", CLEAN_MR),
    ]);
    let mut config = config(root.path(), "simple-scoring", 2);
    config.file_timeout = Some(Duration::from_millis(200));
    let outcome = scan_with(&config);

    let slow = record(&outcome, "slow.dcm");
    assert_eq!(slow.findings.len(), 1);
    assert!(slow.findings[0].message().contains("timed out"));
    assert!(record(&outcome, "fast.dcm").findings.is_empty());
}

/// A pre-set shutdown flag stops new files and marks the outcome interrupted
#[test]
fn test_shutdown_reports_partial_results() {
    let root = tree(&[("SiteA/1234567/a.dcm", CLEAN_MR)]);
    let config = config(root.path(), "simple-scoring", 1);
    let outcome = config
        .build_scanner(std::sync::Arc::new(TextFixtureLoader))
        .unwrap()
        .with_shutdown_flag(stopped_flag())
        .scan(root.path())
        .unwrap();
    assert!(outcome.interrupted);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.total_files, 1);
    assert!(markdown(&Report::from_outcome(&outcome, 0.8)).contains("interrupted"));
}

/// An unknown protocol is rejected before any file is read
#[test]
fn test_unknown_protocol_is_fatal() {
    let root = tree(&[("SiteA/1234567/a.dcm", CLEAN_MR)]);
    let mut config = config(root.path(), "simple-scoring", 1);
    config.protocol = 999;
    let result = config.build_scanner(std::sync::Arc::new(TextFixtureLoader));
    assert!(matches!(result, Err(ConfigError::UnknownProtocol(999))));
}

//! Filters findings by score and groups them into a site/event/file tree

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::core::finding::Finding;
use crate::scanner::{FileRecord, ScanOutcome};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files_discovered: usize,
    pub files_scanned: usize,
    /// Findings before the threshold was applied, structural errors included
    pub total_findings: usize,
    pub reported_findings: usize,
    pub files_with_findings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: String,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub event: String,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub site: String,
    pub events: Vec<EventReport>,
}

/// Findings that survived the threshold, sorted for reproducible output
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub threshold: f64,
    pub interrupted: bool,
    pub summary: Summary,
    /// Errors about the folder layout rather than any one file
    pub structure: Vec<Finding>,
    pub sites: Vec<SiteReport>,
}

/// Descending score, then kind, then message
pub fn finding_order(a: &Finding, b: &Finding) -> Ordering {
    b.score()
        .total_cmp(&a.score())
        .then_with(|| a.kind().cmp(&b.kind()))
        .then_with(|| a.message().cmp(b.message()))
}

type Tree = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<Finding>>>>;

impl Report {
    /// Keep findings with `score > threshold` plus every error finding
    ///
    /// Files, events and sites left without findings are omitted.
    pub fn build(records: &[FileRecord], structural: &[Finding], threshold: f64) -> Self {
        let mut summary = Summary {
            files_discovered: records.len(),
            files_scanned: records.len(),
            total_findings: structural.len(),
            ..Summary::default()
        };

        let mut tree: Tree = BTreeMap::new();
        for record in records {
            summary.total_findings += record.findings.len();
            let kept: Vec<Finding> = record
                .findings
                .iter()
                .filter(|f| f.exceeds(threshold))
                .cloned()
                .collect();
            if kept.is_empty() {
                continue;
            }
            tree.entry(record.site.clone())
                .or_default()
                .entry(record.event.clone())
                .or_default()
                .entry(record.file.clone())
                .or_default()
                .extend(kept);
        }

        let sites: Vec<SiteReport> = tree
            .into_iter()
            .map(|(site, events)| SiteReport {
                site,
                events: events
                    .into_iter()
                    .map(|(event, files)| EventReport {
                        event,
                        files: files
                            .into_iter()
                            .map(|(file, mut findings)| {
                                findings.sort_by(finding_order);
                                FileReport { file, findings }
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        let mut structure = structural.to_vec();
        structure.sort_by(|a, b| {
            a.source_file()
                .cmp(b.source_file())
                .then_with(|| finding_order(a, b))
        });

        summary.files_with_findings = sites
            .iter()
            .flat_map(|s| &s.events)
            .map(|e| e.files.len())
            .sum();
        summary.reported_findings = structure.len()
            + sites
                .iter()
                .flat_map(|s| &s.events)
                .flat_map(|e| &e.files)
                .map(|f| f.findings.len())
                .sum::<usize>();

        Self {
            threshold,
            interrupted: false,
            summary,
            structure,
            sites,
        }
    }

    pub fn from_outcome(outcome: &ScanOutcome, threshold: f64) -> Self {
        let mut report = Self::build(&outcome.records, &outcome.structural, threshold);
        report.summary.files_discovered = outcome.total_files;
        report.interrupted = outcome.interrupted;
        report
    }

    pub fn is_empty(&self) -> bool {
        self.structure.is_empty() && self.sites.is_empty()
    }

    /// Every reported finding in report order
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.structure.iter().chain(
            self.sites
                .iter()
                .flat_map(|s| &s.events)
                .flat_map(|e| &e.files)
                .flat_map(|f| &f.findings),
        )
    }
}

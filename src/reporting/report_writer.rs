//! Report rendering
//!
//! No format carries a timestamp, so identical input renders to
//! identical bytes.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use super::aggregator::{FileReport, Report};
use crate::core::finding::Finding;

/// Output destination meaning standard output
pub const STDOUT: &str = "-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
    /// One row per reported finding
    Csv,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(format!(
                "unknown report format '{other}', expected markdown, json or csv"
            )),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Markdown => "markdown",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        })
    }
}

/// Keep table cells on one line and out of the column delimiters
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn write_table<W: Write>(out: &mut W, findings: &[Finding]) -> io::Result<()> {
    writeln!(out, "| Score | Kind | Details |")?;
    writeln!(out, "|---:|---|---|")?;
    for finding in findings {
        writeln!(
            out,
            "| {:.2} | {} | {} |",
            finding.score(),
            finding.kind().label(),
            cell(finding.message())
        )?;
    }
    writeln!(out)
}

fn write_file<W: Write>(out: &mut W, file: &FileReport) -> io::Result<()> {
    writeln!(out, "#### `{}`", file.file)?;
    writeln!(out)?;
    write_table(out, &file.findings)
}

pub fn write_markdown<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    let summary = &report.summary;
    writeln!(out, "# 🩻 DICOM Validation Report")?;
    writeln!(out)?;
    writeln!(
        out,
        "**Summary:** {} of {} finding(s) reported with score above {:.2} (errors always reported); {} of {} file(s) scanned, {} with findings.",
        summary.reported_findings,
        summary.total_findings,
        report.threshold,
        summary.files_scanned,
        summary.files_discovered,
        summary.files_with_findings,
    )?;
    writeln!(out)?;
    if report.interrupted {
        writeln!(out, "> ⏹️ The scan was interrupted; these results are partial.")?;
        writeln!(out)?;
    }

    if report.is_empty() {
        writeln!(out, "No findings. 🎉")?;
        return Ok(());
    }

    if !report.structure.is_empty() {
        writeln!(out, "## Folder structure")?;
        writeln!(out)?;
        writeln!(out, "| Score | Kind | Details |")?;
        writeln!(out, "|---:|---|---|")?;
        for finding in &report.structure {
            writeln!(
                out,
                "| {:.2} | {} | `{}`: {} |",
                finding.score(),
                finding.kind().label(),
                cell(&finding.source_file().display().to_string()),
                cell(finding.message())
            )?;
        }
        writeln!(out)?;
    }

    for site in &report.sites {
        writeln!(out, "## Site `{}`", site.site)?;
        writeln!(out)?;
        for event in &site.events {
            writeln!(out, "### Event `{}`", event.event)?;
            writeln!(out)?;
            for file in &event.files {
                write_file(out, file)?;
            }
        }
    }
    Ok(())
}

pub fn write_json<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

/// Columns of the CSV report
pub const CSV_HEADER: [&str; 6] = ["site", "event", "file", "kind", "score", "message"];

/// Flat CSV in markdown order; folder-structure rows leave site and event empty
pub fn write_csv<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for finding in &report.structure {
        let folder = finding.source_file().display().to_string();
        writer.write_record(csv_row("", "", &folder, finding))?;
    }
    for site in &report.sites {
        for event in &site.events {
            for file in &event.files {
                for finding in &file.findings {
                    writer.write_record(csv_row(&site.site, &event.event, &file.file, finding))?;
                }
            }
        }
    }
    writer.flush()
}

fn csv_row(site: &str, event: &str, file: &str, finding: &Finding) -> [String; 6] {
    [
        site.to_string(),
        event.to_string(),
        file.to_string(),
        finding.kind().to_string(),
        format!("{:.2}", finding.score()),
        finding.message().to_string(),
    ]
}

pub fn render<W: Write>(report: &Report, format: ReportFormat, out: &mut W) -> io::Result<()> {
    match format {
        ReportFormat::Markdown => write_markdown(report, out),
        ReportFormat::Json => write_json(report, out),
        ReportFormat::Csv => write_csv(report, out),
    }
}

/// Write the report to a file, or to standard output when `destination` is `-`
pub fn write_report(report: &Report, format: ReportFormat, destination: &Path) -> io::Result<()> {
    if destination.as_os_str() == STDOUT {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        render(report, format, &mut out)?;
        return out.flush();
    }
    let mut out = BufWriter::new(File::create(destination)?);
    render(report, format, &mut out)?;
    out.flush()
}

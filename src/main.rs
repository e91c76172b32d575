use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dicom_validator_rs::config::DEFAULT_THRESHOLD;
use dicom_validator_rs::core::recognizer::{DEFAULT_IMAGE_SCORE, DEFAULT_RECOGNIZER};
use dicom_validator_rs::core::validator::registry::DEFAULT_PROTOCOL;
use dicom_validator_rs::logging::init_logging;
use dicom_validator_rs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SiteIds {
    /// Collection folder name verbatim
    Folder,
    /// Salted SHA-256 of the folder name
    Hashed,
}

#[derive(Parser)]
#[command(name = "dicom_validator_rs")]
#[command(about = "Scan DICOM uploads for PHI/PII and protocol conformance", long_about = None)]
struct Cli {
    /// Root directory holding collection/event-ID folders
    #[arg(required_unless_present_any = ["list_recognizers", "list_protocols"])]
    directory: Option<PathBuf>,

    /// Protocol ID whose requirements apply
    #[arg(short, long, default_value_t = DEFAULT_PROTOCOL)]
    protocol: u32,

    /// Report findings scoring above this threshold (errors are always reported)
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    score: f64,

    /// Number of parallel worker threads (default: number of CPUs)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// PHI/PII recognizer to use (see --list-recognizers)
    #[arg(short, long, default_value = DEFAULT_RECOGNIZER)]
    recognizer: String,

    /// Output report file, or - for standard output
    #[arg(short, long, default_value = "report.md")]
    output: PathBuf,

    /// Report format: markdown, json or csv
    #[arg(long, default_value = "markdown")]
    format: ReportFormat,

    /// TOML rule file replacing the built-in requirements
    #[arg(long)]
    rules: Option<PathBuf>,

    /// How site IDs appear in the report
    #[arg(long, value_enum, default_value_t = SiteIds::Folder)]
    site_ids: SiteIds,

    /// Salt for hashed site IDs
    #[arg(long, default_value = "")]
    site_salt: String,

    /// Seconds before a single file is abandoned (0 disables)
    #[arg(long, default_value_t = 30)]
    file_timeout: u64,

    /// Score given to text found in pixels
    #[arg(long, default_value_t = DEFAULT_IMAGE_SCORE)]
    image_score: f64,

    /// Most frames sampled per file for OCR
    #[arg(long, default_value_t = 4)]
    max_frames: usize,

    /// Skip OCR of pixel data
    #[arg(long)]
    no_ocr: bool,

    /// Tesseract executable
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    /// Seconds before one OCR call is killed
    #[arg(long, default_value_t = 20)]
    ocr_timeout: u64,

    /// Retries for a failed OCR call
    #[arg(long, default_value_t = 1)]
    ocr_retries: u32,

    /// Initial backoff between OCR retries in milliseconds, doubling each retry
    #[arg(long, default_value_t = 250)]
    ocr_backoff_ms: u64,

    /// Run in batch mode (no progress bar)
    #[arg(long)]
    batch: bool,

    /// Increase log detail (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// List available recognizers and exit
    #[arg(long)]
    list_recognizers: bool,

    /// List known protocols and exit
    #[arg(long)]
    list_protocols: bool,
}

impl Cli {
    fn to_config(&self, root: PathBuf) -> ScanConfig {
        let mut config = ScanConfig::new(root);
        config.protocol = self.protocol;
        config.threshold = self.score;
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config.recognizer = self.recognizer.clone();
        config.image_score = self.image_score;
        config.output = self.output.clone();
        config.format = self.format;
        config.rules = self.rules.clone();
        config.site_ids = match self.site_ids {
            SiteIds::Folder => SiteIdStrategy::Folder,
            SiteIds::Hashed => SiteIdStrategy::Hashed {
                salt: self.site_salt.clone(),
            },
        };
        config.file_timeout = (self.file_timeout > 0).then(|| Duration::from_secs(self.file_timeout));
        config.ocr = (!self.no_ocr).then(|| OcrSettings {
            binary: self.tesseract.clone(),
            timeout: Duration::from_secs(self.ocr_timeout),
            retries: self.ocr_retries,
            backoff: Duration::from_millis(self.ocr_backoff_ms),
            ..OcrSettings::default()
        });
        config.max_frames = self.max_frames;
        config.show_progress = !self.batch;
        config
    }
}

fn list_protocols(rules: Option<&Path>) -> Result<()> {
    let registry = match rules {
        Some(path) => ValidatorRegistry::from_file(path),
        None => ValidatorRegistry::builtin(),
    }
    .context("Failed to load rules")?;
    for protocol in registry.protocols() {
        println!(
            "{:>6}  {} (modalities: {}; {} requirement(s))",
            protocol.id,
            protocol.name,
            protocol.modalities.join(", "),
            protocol.requirements
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_recognizers {
        for info in RECOGNIZERS {
            println!("{:<16} {}", info.name, info.description);
        }
        return Ok(());
    }
    if cli.list_protocols {
        return list_protocols(cli.rules.as_deref());
    }

    let root = cli
        .directory
        .clone()
        .context("A root directory is required")?;
    let config = cli.to_config(root);

    // Keep standard output clean when the report goes there
    let report_on_stdout = config.output.as_os_str() == "-";
    let say = |line: String| {
        if report_on_stdout {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    };

    // Set up graceful shutdown handler
    let shutdown_requested = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown_requested.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n⚠️  Shutdown requested. Finishing current files...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let loader = Arc::new(DicomFileLoader::new().with_max_frames(config.max_frames));
    let scanner = config
        .build_scanner(loader)
        .context("Invalid configuration")?
        .with_shutdown_flag(shutdown_requested.clone());

    say("DICOM Validator (Rust Edition)".to_string());
    say(format!(
        "Protocol {}, recognizer {}, {} worker thread(s)",
        config.protocol, config.recognizer, config.concurrency
    ));

    let outcome = scanner
        .scan(&config.root)
        .with_context(|| format!("Cannot scan {}", config.root.display()))?;
    let report = Report::from_outcome(&outcome, config.threshold);

    write_report(&report, config.format, &config.output)
        .with_context(|| format!("Failed to write report to {}", config.output.display()))?;

    let summary = &report.summary;
    say("==================================================".to_string());
    say(if outcome.interrupted {
        "SCAN INTERRUPTED (partial results)".to_string()
    } else {
        "SCAN COMPLETE".to_string()
    });
    say("==================================================".to_string());
    say(format!(
        "Files scanned: {}/{}",
        summary.files_scanned, summary.files_discovered
    ));
    say(format!(
        "Findings reported: {} of {} (score > {:.2} or error)",
        summary.reported_findings, summary.total_findings, config.threshold
    ));
    say(format!("Files with findings: {}", summary.files_with_findings));
    if !report_on_stdout {
        say(format!("Report saved to: {}", config.output.display()));
    }

    Ok(())
}

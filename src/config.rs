//! Run configuration, validated before any file is touched

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::dicom::DatasetLoader;
use crate::core::ocr::{DisabledOcr, OcrEngine, OcrSettings, TesseractEngine};
use crate::core::recognizer::{
    build_recognizers, RecognizerContext, DEFAULT_IMAGE_SCORE, DEFAULT_RECOGNIZER, RECOGNIZERS,
};
use crate::core::validator::registry::DEFAULT_PROTOCOL;
use crate::core::validator::ValidatorRegistry;
use crate::error::{ConfigError, Result};
use crate::reporting::ReportFormat;
use crate::scanner::orchestrator::DEFAULT_FILE_TIMEOUT;
use crate::scanner::{FileProcessor, ScanOptions, Scanner, SiteIdStrategy};

/// Findings must score above this to be reported
pub const DEFAULT_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root: PathBuf,
    pub protocol: u32,
    pub threshold: f64,
    pub concurrency: usize,
    pub recognizer: String,
    pub image_score: f64,
    pub output: PathBuf,
    pub format: ReportFormat,
    /// Rule file replacing the built-in rules
    pub rules: Option<PathBuf>,
    pub site_ids: SiteIdStrategy,
    pub file_timeout: Option<Duration>,
    /// `None` disables OCR
    pub ocr: Option<OcrSettings>,
    pub max_frames: usize,
    pub show_progress: bool,
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            protocol: DEFAULT_PROTOCOL,
            threshold: DEFAULT_THRESHOLD,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            recognizer: DEFAULT_RECOGNIZER.to_string(),
            image_score: DEFAULT_IMAGE_SCORE,
            output: PathBuf::from("report.md"),
            format: ReportFormat::Markdown,
            rules: None,
            site_ids: SiteIdStrategy::Folder,
            file_timeout: Some(DEFAULT_FILE_TIMEOUT),
            ocr: Some(OcrSettings::default()),
            max_frames: crate::core::dicom::DEFAULT_MAX_FRAMES,
            show_progress: false,
        }
    }

    /// Check everything that can be checked without reading the root or rule file
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if !RECOGNIZERS.iter().any(|r| r.name == self.recognizer) {
            return Err(ConfigError::UnknownRecognizer(self.recognizer.clone()));
        }
        Ok(())
    }

    /// Built-in rules, or the configured rule file
    pub fn registry(&self) -> Result<ValidatorRegistry> {
        match &self.rules {
            Some(path) => ValidatorRegistry::from_file(path),
            None => ValidatorRegistry::builtin(),
        }
    }

    /// Tesseract when configured and installed, otherwise blank OCR
    pub fn ocr_engine(&self) -> Arc<dyn OcrEngine> {
        match &self.ocr {
            Some(settings) if TesseractEngine::is_available(&settings.binary) => {
                Arc::new(TesseractEngine::new(settings.clone()))
            }
            Some(settings) => {
                tracing::warn!(
                    binary = %settings.binary.display(),
                    "OCR engine not found; pixel text will not be checked"
                );
                Arc::new(DisabledOcr)
            }
            None => Arc::new(DisabledOcr),
        }
    }

    /// Validate, resolve the protocol and assemble a ready-to-run scanner
    pub fn build_scanner(&self, loader: Arc<dyn DatasetLoader>) -> Result<Scanner> {
        self.validate()?;
        let validators = self.registry()?.validators_for(self.protocol)?;
        let context = RecognizerContext {
            ocr: self.ocr_engine(),
            image_score: self.image_score,
        };
        let recognizers = build_recognizers(&self.recognizer, &context)?;
        let processor = FileProcessor::new(loader, recognizers, validators);
        tracing::info!(
            protocol = self.protocol,
            recognizers = ?processor.recognizer_names(),
            validators = processor.validator_count(),
            "Configured scanner"
        );
        Ok(Scanner::new(processor, self.scan_options()))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            concurrency: self.concurrency,
            file_timeout: self.file_timeout,
            site_ids: self.site_ids.clone(),
            show_progress: self.show_progress,
        }
    }
}

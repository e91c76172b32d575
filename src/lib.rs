//! DICOM Validator Library
//!
//! Scans a tree of DICOM imaging files for protected health information in
//! headers and pixels, checks them against protocol requirements, and
//! reports the findings grouped by site, event and file.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod reporting;
pub mod scanner;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ScanConfig, DEFAULT_THRESHOLD};
    pub use crate::core::dataset::{Dataset, Element, Frame, Tag};
    pub use crate::core::dicom::{DatasetLoader, DicomFileLoader};
    pub use crate::core::finding::{Finding, FindingKind};
    pub use crate::core::ocr::{DisabledOcr, OcrEngine, OcrSettings, TesseractEngine};
    pub use crate::core::recognizer::{build_recognizers, Recognizer, RecognizerContext, RECOGNIZERS};
    pub use crate::core::validator::{Validator, ValidatorRegistry};
    pub use crate::error::{CheckError, ConfigError, LoadError, OcrError};
    pub use crate::reporting::{write_report, Report, ReportFormat};
    pub use crate::scanner::{
        FileProcessor, FileRecord, ScanOptions, ScanOutcome, Scanner, SiteIdStrategy, Stage,
    };
}

//! PHI/PII recognizers
//!
//! A recognizer scores one file's metadata and/or pixels and returns zero or
//! more findings. Recognizers hold no per-file state, so a single instance is
//! shared by every worker thread.
//!
//! Variants are resolved by name from a static table at configuration time:
//!
//! | name | recognizers |
//! |---|---|
//! | `simple-scoring` | header + pixels (default) |
//! | `header` | header only |
//! | `pixels` | pixels only |
//! | `accepting` | never finds anything |
//! | `rejecting` | always finds one maximal-score finding |

pub mod header;
pub mod pixels;
pub mod testing;

use std::path::Path;
use std::sync::Arc;

use super::dataset::Dataset;
use super::finding::Finding;
use super::ocr::OcrEngine;
use crate::error::{CheckError, ConfigError};

pub use header::HeaderRecognizer;
pub use pixels::PixelRecognizer;
pub use testing::{AcceptingRecognizer, RejectingRecognizer};

/// Detection strategy for PHI/PII in one file
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the file processor must decode frames for this recognizer
    fn needs_pixels(&self) -> bool {
        false
    }

    fn recognize(&self, dataset: &Dataset, source: &Path) -> Result<Vec<Finding>, CheckError>;
}

/// Name and help text of a selectable recognizer
#[derive(Debug, Clone, Copy)]
pub struct RecognizerInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_RECOGNIZER: &str = "simple-scoring";

pub const RECOGNIZERS: &[RecognizerInfo] = &[
    RecognizerInfo {
        name: "simple-scoring",
        description: "Scores patterns in well-known tags and OCR text from pixels",
    },
    RecognizerInfo {
        name: "header",
        description: "Scores patterns in header tags only",
    },
    RecognizerInfo {
        name: "pixels",
        description: "Looks for PHI/PII burned into pixels with OCR only",
    },
    RecognizerInfo {
        name: "accepting",
        description: "Always accepts: never finds PHI/PII, for testing purposes",
    },
    RecognizerInfo {
        name: "rejecting",
        description: "Always rejects: finds PHI/PII in every file, for testing purposes",
    },
];

/// Score given to every pixel finding unless configured otherwise
pub const DEFAULT_IMAGE_SCORE: f64 = 0.8;

/// Collaborators the recognizers may need
#[derive(Clone)]
pub struct RecognizerContext {
    pub ocr: Arc<dyn OcrEngine>,
    pub image_score: f64,
}

/// Instantiate the recognizers registered under `name`
pub fn build_recognizers(
    name: &str,
    context: &RecognizerContext,
) -> Result<Vec<Box<dyn Recognizer>>, ConfigError> {
    let pixels = || -> Box<dyn Recognizer> {
        Box::new(PixelRecognizer::new(context.ocr.clone(), context.image_score))
    };
    let recognizers: Vec<Box<dyn Recognizer>> = match name {
        "simple-scoring" => vec![Box::new(HeaderRecognizer::new()), pixels()],
        "header" => vec![Box::new(HeaderRecognizer::new())],
        "pixels" => vec![pixels()],
        "accepting" => vec![Box::new(AcceptingRecognizer)],
        "rejecting" => vec![Box::new(RejectingRecognizer)],
        other => return Err(ConfigError::UnknownRecognizer(other.to_string())),
    };
    Ok(recognizers)
}

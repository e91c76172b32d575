//! Recognizers with fixed answers, used to exercise filtering and aggregation

use std::path::Path;

use super::Recognizer;
use crate::core::dataset::Dataset;
use crate::core::finding::{Finding, MAX_SCORE};
use crate::error::CheckError;

/// Never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptingRecognizer;

impl Recognizer for AcceptingRecognizer {
    fn name(&self) -> &'static str {
        "accepting"
    }

    fn recognize(&self, _dataset: &Dataset, source: &Path) -> Result<Vec<Finding>, CheckError> {
        tracing::debug!(path = %source.display(), "Accepting recognizer giving no findings");
        Ok(Vec::new())
    }
}

/// Always finds exactly one maximal-score header finding
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingRecognizer;

impl Recognizer for RejectingRecognizer {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    fn recognize(&self, _dataset: &Dataset, source: &Path) -> Result<Vec<Finding>, CheckError> {
        tracing::debug!(path = %source.display(), "Rejecting recognizer flagging file");
        Ok(vec![Finding::header(
            MAX_SCORE,
            "(0010,0010) PatientName «Jane Doe»: PHI/PII artificially found for testing purposes",
            source,
        )])
    }
}

//! Looks for PHI/PII burned into pixel data using OCR

use std::path::Path;
use std::sync::Arc;

use super::Recognizer;
use crate::core::dataset::Dataset;
use crate::core::finding::Finding;
use crate::core::ocr::OcrEngine;
use crate::core::patterns::PatternClass;
use crate::error::CheckError;

/// Characters of OCR text kept on either side of a match
const CONTEXT_CHARS: usize = 24;

pub struct PixelRecognizer {
    ocr: Arc<dyn OcrEngine>,
    image_score: f64,
}

impl PixelRecognizer {
    pub fn new(ocr: Arc<dyn OcrEngine>, image_score: f64) -> Self {
        Self { ocr, image_score }
    }
}

impl Recognizer for PixelRecognizer {
    fn name(&self) -> &'static str {
        "pixels"
    }

    fn needs_pixels(&self) -> bool {
        true
    }

    fn recognize(&self, dataset: &Dataset, source: &Path) -> Result<Vec<Finding>, CheckError> {
        if let Some(reason) = dataset.pixel_error() {
            return Err(CheckError::Failed {
                check: "pixel rendering".to_string(),
                reason: reason.to_string(),
            });
        }

        let mut findings = Vec::new();

        for frame in dataset.frames() {
            let raw = match self.ocr.recognize_text(frame) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        path = %source.display(),
                        frame = frame.index,
                        error = %e,
                        "OCR failed"
                    );
                    findings.push(Finding::error(
                        format!("OCR failed on frame {}: {e}", frame.index),
                        source,
                    ));
                    continue;
                }
            };

            let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                continue;
            }

            for class in PatternClass::TEXT_CLASSES {
                if let Some(m) = class.regex().find(&text) {
                    findings.push(Finding::pixels(
                        self.image_score,
                        format!(
                            "Burned-in {class} in frame {} via {}: «{}»",
                            frame.index,
                            self.ocr.name(),
                            excerpt(&text, m.start(), m.end(), CONTEXT_CHARS)
                        ),
                        source,
                    ));
                }
            }
        }

        Ok(findings)
    }
}

/// The match at `start..end` plus up to `context` characters on each side
pub fn excerpt(text: &str, start: usize, end: usize, context: usize) -> String {
    let before: Vec<(usize, char)> = text[..start].char_indices().collect();
    let from = before
        .len()
        .checked_sub(context)
        .and_then(|i| before.get(i))
        .map(|(i, _)| *i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(context)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[from..to].to_string()
}

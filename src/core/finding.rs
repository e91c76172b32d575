//! Findings produced by recognizers and validators

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Highest severity; error findings always carry it
pub const MAX_SCORE: f64 = 1.0;

/// What produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    Header,
    Pixels,
    Validation,
    Error,
}

impl FindingKind {
    /// Label used in rendered reports
    pub fn label(self) -> &'static str {
        match self {
            FindingKind::Header => "🙈 Header",
            FindingKind::Pixels => "🖼️ Pixels",
            FindingKind::Validation => "⚠️ Validation",
            FindingKind::Error => "❌ Error",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FindingKind::Header => "header",
            FindingKind::Pixels => "pixels",
            FindingKind::Validation => "validation",
            FindingKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// A single reported issue with a severity score in `[0.0, 1.0]`
///
/// Fields are private so the score invariant cannot be broken after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    kind: FindingKind,
    score: f64,
    message: String,
    source_file: PathBuf,
}

impl Finding {
    /// Create a finding, clamping the score into range
    ///
    /// Error findings ignore `score` and always get [`MAX_SCORE`].
    pub fn new(
        kind: FindingKind,
        score: f64,
        message: impl Into<String>,
        source_file: impl AsRef<Path>,
    ) -> Self {
        let score = if kind == FindingKind::Error {
            MAX_SCORE
        } else {
            clamp_score(score)
        };
        Self {
            kind,
            score,
            message: message.into(),
            source_file: source_file.as_ref().to_path_buf(),
        }
    }

    pub fn header(score: f64, message: impl Into<String>, source: impl AsRef<Path>) -> Self {
        Self::new(FindingKind::Header, score, message, source)
    }

    pub fn pixels(score: f64, message: impl Into<String>, source: impl AsRef<Path>) -> Self {
        Self::new(FindingKind::Pixels, score, message, source)
    }

    pub fn validation(score: f64, message: impl Into<String>, source: impl AsRef<Path>) -> Self {
        Self::new(FindingKind::Validation, score, message, source)
    }

    pub fn error(message: impl Into<String>, source: impl AsRef<Path>) -> Self {
        Self::new(FindingKind::Error, MAX_SCORE, message, source)
    }

    pub fn kind(&self) -> FindingKind {
        self.kind
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Whether this finding survives a report threshold
    ///
    /// Errors always survive; everything else must exceed the threshold.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.kind == FindingKind::Error || self.score > threshold
    }
}

/// Clamp into `[0.0, 1.0]`, mapping NaN to zero
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, MAX_SCORE)
    }
}

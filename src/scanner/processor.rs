//! Runs every check on one file, isolating failures into error findings

use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::file_scanner::PathIdentity;
use crate::core::dataset::Dataset;
use crate::core::dicom::DatasetLoader;
use crate::core::finding::Finding;
use crate::core::recognizer::Recognizer;
use crate::core::validator::Validator;
use crate::error::{CheckError, LoadError};

/// Processing stage of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Loading,
    Scanning,
    Validating,
    Done,
    Failed,
}

/// Everything learned about one file
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub site: String,
    pub event: String,
    pub file: String,
    pub stage: Stage,
    pub findings: Vec<Finding>,
}

impl FileRecord {
    /// A record holding a single error finding
    pub fn failed(path: &Path, identity: &PathIdentity, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            site: identity.site.clone(),
            event: identity.event.clone(),
            file: identity.file.clone(),
            stage: Stage::Failed,
            findings: vec![Finding::error(message, identity.report_path())],
        }
    }
}

/// Loads a file once, then applies the recognizers and validators to it
pub struct FileProcessor {
    loader: Arc<dyn DatasetLoader>,
    recognizers: Vec<Box<dyn Recognizer>>,
    validators: Vec<Box<dyn Validator>>,
    needs_pixels: bool,
}

impl FileProcessor {
    pub fn new(
        loader: Arc<dyn DatasetLoader>,
        recognizers: Vec<Box<dyn Recognizer>>,
        validators: Vec<Box<dyn Validator>>,
    ) -> Self {
        let needs_pixels = recognizers.iter().any(|r| r.needs_pixels());
        Self {
            loader,
            recognizers,
            validators,
            needs_pixels,
        }
    }

    pub fn recognizer_names(&self) -> Vec<&str> {
        self.recognizers.iter().map(|r| r.name()).collect()
    }

    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    fn load(&self, path: &Path) -> Result<Dataset, LoadError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.loader.load(path, self.needs_pixels)))
            .unwrap_or(Err(LoadError::Panic))
    }

    /// Process one file; never fails, problems become error findings
    pub fn process(&self, path: &Path, identity: &PathIdentity) -> FileRecord {
        let mut stage = Stage::Loading;
        tracing::debug!(path = %path.display(), ?stage, "Processing file");

        let dataset = match self.load(path) {
            Ok(dataset) => dataset,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load file");
                return FileRecord::failed(path, identity, e.to_string());
            }
        };

        // Findings name the file by its place in the layout, not the local disk path
        let source = identity.report_path();
        let mut findings = Vec::new();

        stage = Stage::Scanning;
        tracing::debug!(path = %path.display(), ?stage, "Stage transition");
        for recognizer in &self.recognizers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                recognizer.recognize(&dataset, &source)
            }))
            .unwrap_or_else(|_| Err(CheckError::Panic(recognizer.name().to_string())));
            match outcome {
                Ok(found) => findings.extend(found),
                Err(e) => findings.push(isolated(path, &source, "recognizer", recognizer.name(), e)),
            }
        }

        stage = Stage::Validating;
        tracing::debug!(path = %path.display(), ?stage, "Stage transition");
        for validator in &self.validators {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                validator.validate(&dataset, &source)
            }))
            .unwrap_or_else(|_| Err(CheckError::Panic(validator.name().to_string())));
            match outcome {
                Ok(found) => findings.extend(found),
                Err(e) => findings.push(isolated(path, &source, "validator", validator.name(), e)),
            }
        }

        stage = Stage::Done;
        tracing::debug!(path = %path.display(), ?stage, findings = findings.len(), "Stage transition");
        FileRecord {
            path: path.to_path_buf(),
            site: identity.site.clone(),
            event: identity.event.clone(),
            file: identity.file.clone(),
            stage,
            findings,
        }
    }
}

fn isolated(path: &Path, source: &Path, role: &str, name: &str, error: CheckError) -> Finding {
    tracing::warn!(path = %path.display(), role, name, error = %error, "Check failed");
    Finding::error(format!("{role} {name}: {error}"), source)
}

//! Error types for the scanning pipeline
//!
//! Only [`ConfigError`] stops a run. Every other error is converted into an
//! error finding by the file processor so the report reflects what could be
//! learned from a partially broken batch.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems discovered before any file is processed
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown protocol ID {0}")]
    UnknownProtocol(u32),

    #[error("Unknown recognizer '{0}'")]
    UnknownRecognizer(String),

    #[error("Score threshold {0} is not in the range [0.0, 1.0]")]
    InvalidThreshold(f64),

    #[error("Concurrency must be a positive integer")]
    InvalidConcurrency,

    #[error("Root directory {path} is not readable")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to read rule file: {path}")]
    RuleFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Rule file parse error: {0}")]
    RuleParse(#[from] toml::de::Error),

    #[error("Invalid requirement '{name}': {reason}")]
    InvalidRequirement { name: String, reason: String },

    #[error("Invalid protocol key '{0}', expected a numeric protocol ID")]
    InvalidProtocolKey(String),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// A file could not be decoded into a dataset
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Cannot read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a readable DICOM file: {0}")]
    InvalidDicom(String),

    #[error("Unsupported pixel data: {0}")]
    UnsupportedPixels(String),

    #[error("Decoder panicked")]
    Panic,
}

/// A recognizer or validator failed internally on one file
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("{check} failed: {reason}")]
    Failed { check: String, reason: String },

    #[error("{0} panicked")]
    Panic(String),
}

/// The OCR step failed for one frame
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    #[error("OCR engine exited with status {status}")]
    Exit { status: String },

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

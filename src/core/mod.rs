//! Core detection and validation logic

pub mod circuit_breaker;
pub mod dataset;
pub mod dicom;
pub mod finding;
pub mod ocr;
pub mod patterns;
pub mod recognizer;
pub mod validator;

pub use dataset::{Dataset, Element, Frame, Tag};
pub use finding::{Finding, FindingKind};

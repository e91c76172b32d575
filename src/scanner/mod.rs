//! File discovery, per-file processing and parallel orchestration

pub mod file_scanner;
pub mod orchestrator;
pub mod processor;

pub use file_scanner::{discover, identify, PathIdentity, SiteIdStrategy};
pub use orchestrator::{ScanOptions, ScanOutcome, Scanner};
pub use processor::{FileProcessor, FileRecord, Stage};

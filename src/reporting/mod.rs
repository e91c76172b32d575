//! Aggregation and rendering of scan results

pub mod aggregator;
pub mod report_writer;

pub use aggregator::{Report, Summary};
pub use report_writer::{render, write_report, ReportFormat};

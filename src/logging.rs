//! Diagnostic logging on standard error
//!
//! `RUST_LOG` overrides the level chosen from the verbosity flag. The report
//! itself never goes through the logger.

use tracing_subscriber::{fmt, EnvFilter};

/// Level for this crate given the number of `-v` flags
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub fn filter_for(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dicom_validator_rs={}", level_for(verbosity))))
}

/// Install the global subscriber; later calls are ignored
pub fn init_logging(verbosity: u8) {
    let _ = fmt()
        .with_env_filter(filter_for(verbosity))
        .with_target(verbosity > 0)
        .with_thread_names(verbosity > 0)
        .with_writer(std::io::stderr)
        .try_init();
}

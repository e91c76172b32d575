//! Fans files out to a bounded worker pool and collects their records

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::file_scanner::{discover, PathIdentity, SiteIdStrategy};
use super::processor::{FileProcessor, FileRecord};
use crate::core::finding::Finding;
use crate::error::ConfigError;

pub const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_secs(30);
const PERMIT_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub concurrency: usize,
    /// `None` disables the per-file timeout
    pub file_timeout: Option<Duration>,
    pub site_ids: SiteIdStrategy,
    pub show_progress: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            file_timeout: Some(DEFAULT_FILE_TIMEOUT),
            site_ids: SiteIdStrategy::default(),
            show_progress: false,
        }
    }
}

/// What a scan produced
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<FileRecord>,
    /// One error per folder holding files outside the expected layout
    pub structural: Vec<Finding>,
    /// Files discovered, processed or not
    pub total_files: usize,
    /// Set when a shutdown request stopped the scan early
    pub interrupted: bool,
}

pub struct Scanner {
    processor: Arc<FileProcessor>,
    options: ScanOptions,
    shutdown: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(processor: FileProcessor, options: ScanOptions) -> Self {
        Self {
            processor: Arc::new(processor),
            options,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a shutdown flag, e.g. one set by a Ctrl-C handler
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Scan every file under `root`
    ///
    /// Only configuration problems (bad root, unusable pool) are errors;
    /// everything that goes wrong with a file ends up in its record.
    pub fn scan(&self, root: &Path) -> Result<ScanOutcome, ConfigError> {
        if self.options.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        let discovery = discover(root)?;

        let structural: Vec<Finding> = discovery
            .stray_folders
            .iter()
            .map(|stray| {
                tracing::warn!(
                    folder = %stray.folder.display(),
                    files = stray.files,
                    "Files outside the collection/event-ID layout"
                );
                Finding::error(
                    format!(
                        "{} file(s) outside a collection-folder/event-ID-folder structure; not processed",
                        stray.files
                    ),
                    &stray.folder,
                )
            })
            .collect();

        let files: Vec<(PathBuf, PathIdentity)> = discovery
            .files
            .into_iter()
            .map(|(path, mut identity)| {
                identity.site = self.options.site_ids.site_id(&identity.site);
                (path, identity)
            })
            .collect();
        let total_files = files.len();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.concurrency)
            .build()
            .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;

        let progress = if self.options.show_progress {
            let pb = ProgressBar::new(total_files as u64);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        tracing::info!(
            files = total_files,
            workers = self.options.concurrency,
            "Scanning"
        );

        // A timed-out worker keeps its permit until it really finishes
        let workers = Arc::new(Semaphore::new(self.options.concurrency));

        let records: Vec<FileRecord> = pool.install(|| {
            files
                .par_iter()
                .progress_with(progress.clone())
                .filter_map(|(path, identity)| {
                    if self.shutdown.load(Ordering::SeqCst) {
                        return None;
                    }
                    Some(self.process_with_timeout(path, identity, &workers))
                })
                .collect()
        });

        let interrupted = self.shutdown.load(Ordering::SeqCst);
        if interrupted {
            progress.abandon_with_message("Interrupted");
            tracing::warn!(
                processed = records.len(),
                total = total_files,
                "Scan interrupted; reporting partial results"
            );
        } else {
            progress.finish_with_message("Scan complete");
        }

        Ok(ScanOutcome {
            records,
            structural,
            total_files,
            interrupted,
        })
    }

    fn process_with_timeout(
        &self,
        path: &Path,
        identity: &PathIdentity,
        workers: &Arc<Semaphore>,
    ) -> FileRecord {
        let Some(timeout) = self.options.file_timeout else {
            return self.processor.process(path, identity);
        };

        let permit = acquire(workers);
        let (tx, rx) = mpsc::channel();
        let processor = self.processor.clone();
        let owned_path = path.to_path_buf();
        let owned_identity = identity.clone();
        let spawned = thread::Builder::new()
            .name("file-worker".to_string())
            .spawn(move || {
                let _permit = permit;
                let record = processor.process(&owned_path, &owned_identity);
                // The receiver is gone when the file timed out
                let _ = tx.send(record);
            });
        if let Err(e) = spawned {
            return FileRecord::failed(path, identity, format!("Cannot start file worker: {e}"));
        }

        match rx.recv_timeout(timeout) {
            Ok(record) => record,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(path = %path.display(), ?timeout, "File timed out");
                FileRecord::failed(
                    path,
                    identity,
                    format!("Processing timed out after {}s", timeout.as_secs_f64()),
                )
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                FileRecord::failed(path, identity, "File worker exited without a result")
            }
        }
    }
}

/// Block until a worker slot is free
fn acquire(workers: &Arc<Semaphore>) -> OwnedSemaphorePermit {
    loop {
        if let Ok(permit) = workers.clone().try_acquire_owned() {
            return permit;
        }
        thread::sleep(PERMIT_POLL);
    }
}

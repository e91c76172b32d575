//! OCR capability used to look for PHI/PII burned into pixels
//!
//! The engine is the `tesseract` executable. Each frame is written as a
//! binary PGM into a scratch directory and recognized in a child process so a
//! hung recognition can be killed at the configured timeout.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use super::circuit_breaker::CircuitBreaker;
use super::dataset::Frame;
use crate::error::OcrError;

/// Consecutive OCR failures before the breaker opens
const BREAKER_THRESHOLD: usize = 10;
const BREAKER_COOLDOWN: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Renders a frame to text
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Recognized text, empty when the frame has none
    fn recognize_text(&self, frame: &Frame) -> Result<String, OcrError>;
}

/// Declared OCR policy: timeout, bounded retries with backoff, process cap
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub binary: PathBuf,
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
    pub max_concurrent: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            timeout: Duration::from_secs(20),
            retries: 1,
            backoff: Duration::from_millis(250),
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl OcrSettings {
    /// Backoff before retry number `attempt` (zero-based), doubling each time
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// OCR turned off; every frame reads as blank
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledOcr;

impl OcrEngine for DisabledOcr {
    fn name(&self) -> &str {
        "disabled"
    }

    fn recognize_text(&self, _frame: &Frame) -> Result<String, OcrError> {
        Ok(String::new())
    }
}

/// Tesseract run as a child process
pub struct TesseractEngine {
    settings: OcrSettings,
    permits: Semaphore,
    breaker: CircuitBreaker,
}

impl TesseractEngine {
    pub fn new(settings: OcrSettings) -> Self {
        let permits = Semaphore::new(settings.max_concurrent.max(1));
        Self {
            settings,
            permits,
            breaker: CircuitBreaker::new(BREAKER_THRESHOLD, BREAKER_COOLDOWN),
        }
    }

    /// Whether `binary --version` runs successfully
    pub fn is_available(binary: &Path) -> bool {
        Command::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn run_once(&self, frame: &Frame) -> Result<String, OcrError> {
        let scratch = TempDir::new()?;
        let input = scratch.path().join("frame.pgm");
        let output_base = scratch.path().join("text");
        write_pgm(&input, frame)?;

        let mut child = Command::new(&self.settings.binary)
            .arg(&input)
            .arg(&output_base)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::Unavailable(format!(
                    "{} not found",
                    self.settings.binary.display()
                )),
                _ => OcrError::Io(e),
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.settings.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Timeout(self.settings.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(OcrError::Exit {
                status: status.to_string(),
            });
        }
        Ok(fs::read_to_string(output_base.with_extension("txt"))?)
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize_text(&self, frame: &Frame) -> Result<String, OcrError> {
        if self.breaker.is_open() {
            return Err(OcrError::Unavailable(
                "circuit breaker is open after repeated OCR failures".to_string(),
            ));
        }

        let mut attempt = 0;
        loop {
            // Bound the number of concurrent tesseract processes
            let permit = loop {
                if let Ok(permit) = self.permits.try_acquire() {
                    break permit;
                }
                std::thread::sleep(POLL_INTERVAL);
            };

            match self.run_once(frame) {
                Ok(text) => {
                    self.breaker.record_success();
                    return Ok(text);
                }
                Err(e) => {
                    self.breaker.record_failure();
                    let retryable = !matches!(e, OcrError::Unavailable(_));
                    if !retryable || attempt >= self.settings.retries {
                        return Err(e);
                    }
                    let delay = self.settings.backoff_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.settings.retries + 1,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying OCR"
                    );
                    drop(permit);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Write an 8-bit grayscale frame as binary PGM (P5)
pub fn write_pgm(path: &Path, frame: &Frame) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P5\n{} {}\n255\n", frame.width, frame.height)?;
    out.write_all(&frame.pixels)?;
    out.flush()
}

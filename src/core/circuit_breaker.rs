use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Breaker state, stored as a `u8` so it fits in an atomic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BreakerState {
    /// Calls go through
    Closed = 0,
    /// Too many consecutive failures; calls are refused until the cooldown ends
    Open = 1,
    /// Cooldown elapsed; the next call decides whether to close again
    HalfOpen = 2,
}

impl BreakerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BreakerState::Open,
            2 => BreakerState::HalfOpen,
            _ => BreakerState::Closed,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Circuit breaker shared by all workers calling the OCR engine
///
/// A missing or crashing OCR install would otherwise cost a full timeout and
/// retry cycle on every frame of every file.
pub struct CircuitBreaker {
    state: AtomicU8,
    failure_count: AtomicUsize,
    failure_threshold: usize,
    epoch: Instant,
    last_failure_ms: AtomicU64,
    cooldown: Duration,
}

impl CircuitBreaker {
    /// Open after `failure_threshold` consecutive failures, try again after `cooldown`
    pub fn new(failure_threshold: usize, cooldown: Duration) -> Self {
        Self {
            state: AtomicU8::new(BreakerState::Closed as u8),
            failure_count: AtomicUsize::new(0),
            failure_threshold: failure_threshold.max(1),
            epoch: Instant::now(),
            last_failure_ms: AtomicU64::new(0),
            cooldown,
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn state(&self) -> BreakerState {
        BreakerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True while calls should be refused
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and
    /// lets the caller through.
    pub fn is_open(&self) -> bool {
        if self.state() != BreakerState::Open {
            return false;
        }
        let since_failure = self
            .now_ms()
            .saturating_sub(self.last_failure_ms.load(Ordering::Acquire));
        if since_failure >= self.cooldown.as_millis() as u64 {
            self.state
                .store(BreakerState::HalfOpen as u8, Ordering::Release);
            false
        } else {
            true
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Release);
        self.state.store(BreakerState::Closed as u8, Ordering::Release);
    }

    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
        self.last_failure_ms.store(self.now_ms(), Ordering::Release);

        if failures >= self.failure_threshold || self.state() == BreakerState::HalfOpen {
            self.state.store(BreakerState::Open as u8, Ordering::Release);
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::Acquire)
    }

    pub fn state_name(&self) -> &'static str {
        self.state().name()
    }
}

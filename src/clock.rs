//! Time sources for record timestamps

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Supplies epoch seconds for each record
pub trait TimeSource: Send {
    fn now(&self) -> i64;

    /// True when timestamps do not come from a real clock
    fn is_synthetic(&self) -> bool {
        false
    }
}

/// Wall clock of the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Constant fallback for bench runs without a synchronised clock
///
/// Defaults to the epoch so its records cannot pass for real measurements.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub i64);

impl FixedClock {
    /// Fallback values must stay below 2000-01-01T00:00:00Z
    pub const CEILING: i64 = 946_684_800;

    /// True when `secs` is obviously not wall-clock time
    pub fn is_recognisable(secs: i64) -> bool {
        (0..Self::CEILING).contains(&secs)
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }

    fn is_synthetic(&self) -> bool {
        true
    }
}

/// Clock moved by hand, shared between a test and the code under test
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn starting_at(secs: i64) -> Self {
        Self(Arc::new(AtomicI64::new(secs)))
    }

    pub fn set(&self, secs: i64) {
        self.0.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// src/diagnostics.rs

//! Opt-in timing of process start-up, enabled with `PROCCTL_MEASURE_PROCESS`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;
use tracing::info;

static ENABLED: Lazy<bool> = Lazy::new(|| std::env::var_os("PROCCTL_MEASURE_PROCESS").is_some());

pub static START_STATS: MeasureStats = MeasureStats::new();
pub static WAIT_FOR_STARTED_STATS: MeasureStats = MeasureStats::new();

pub fn enabled() -> bool {
    *ENABLED
}

/// Accumulated call count and time of one measured operation.
#[derive(Debug)]
pub struct MeasureStats {
    hits: AtomicU64,
    total_ms: AtomicU64,
}

impl MeasureStats {
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            total_ms: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms.load(Ordering::Relaxed)
    }

    fn record(&self, elapsed_ms: u64) -> (u64, u64) {
        let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total_ms.fetch_add(elapsed_ms, Ordering::Relaxed) + elapsed_ms;
        (hits, total)
    }
}

impl Default for MeasureStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `f`, recording and logging its duration when diagnostics are on.
pub fn measure<T>(name: &str, stats: &MeasureStats, f: impl FnOnce() -> T) -> T {
    if !enabled() {
        return f();
    }
    let started = Instant::now();
    let out = f();
    let current_ms = started.elapsed().as_millis() as u64;
    let (hits, total_ms) = stats.record(current_ms);
    info!(
        measurement = name,
        hits,
        current_ms,
        total_ms,
        "process timing"
    );
    out
}

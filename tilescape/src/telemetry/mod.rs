//! Scheduler telemetry: lock-free counters with point-in-time snapshots.
//!
//! Counters are recorded from the frame loop and from spawned fetch tasks,
//! so everything is atomic. Consumers take a [`MetricsSnapshot`] whenever
//! they want a consistent-enough view for display.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free scheduler activity counters.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    frames: AtomicU64,
    tiles_created: AtomicU64,
    tiles_evicted: AtomicU64,
    loads_started: AtomicU64,
    loads_completed: AtomicU64,
    source_failures: AtomicU64,
    builds_completed: AtomicU64,
    builds_failed: AtomicU64,
}

impl SchedulerMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// One `update()` pass ran.
    pub fn frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Tiles were instantiated (children are created four at a time).
    pub fn tiles_created(&self, count: u64) {
        self.tiles_created.fetch_add(count, Ordering::Relaxed);
    }

    /// A cached tile was unloaded by the eviction sweep.
    pub fn tile_evicted(&self) {
        self.tiles_evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile entered the load phase.
    pub fn load_started(&self) {
        self.loads_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile's fetch pass finished (any outcome).
    pub fn load_completed(&self) {
        self.loads_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// One source failed during a tile's fetch pass.
    pub fn source_failure(&self) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile build finished successfully.
    pub fn build_completed(&self) {
        self.builds_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// A tile build failed fatally.
    pub fn build_failed(&self) {
        self.builds_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            tiles_created: self.tiles_created.load(Ordering::Relaxed),
            tiles_evicted: self.tiles_evicted.load(Ordering::Relaxed),
            loads_started: self.loads_started.load(Ordering::Relaxed),
            loads_completed: self.loads_completed.load(Ordering::Relaxed),
            source_failures: self.source_failures.load(Ordering::Relaxed),
            builds_completed: self.builds_completed.load(Ordering::Relaxed),
            builds_failed: self.builds_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SchedulerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of `update()` passes.
    pub frames: u64,
    /// Tiles instantiated.
    pub tiles_created: u64,
    /// Tiles unloaded by eviction.
    pub tiles_evicted: u64,
    /// Fetch passes started.
    pub loads_started: u64,
    /// Fetch passes completed.
    pub loads_completed: u64,
    /// Individual source fetch failures.
    pub source_failures: u64,
    /// Successful tile builds.
    pub builds_completed: u64,
    /// Fatally failed tile builds.
    pub builds_failed: u64,
}

impl MetricsSnapshot {
    /// Fetch passes still in flight at snapshot time.
    pub fn loads_in_flight(&self) -> u64 {
        self.loads_started.saturating_sub(self.loads_completed)
    }
}

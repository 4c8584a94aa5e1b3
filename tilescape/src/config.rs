//! Scheduler configuration.

/// Default cap on concurrently in-flight tile fetches.
pub const DEFAULT_MAX_LOADING: usize = 50;

/// Default cap on tile builds started within a single frame.
pub const DEFAULT_MAX_INITIALIZING: usize = 8;

/// Eviction runs only once more than this many cached tiles went unvisited.
pub const DEFAULT_EVICTION_HARD_CAP: usize = 100;

/// An eviction sweep unloads oldest-first until this many candidates remain.
pub const DEFAULT_EVICTION_SOFT_CAP: usize = 50;

/// Tunables for one [`TileScheduler`](crate::scheduler::TileScheduler).
///
/// Each scheduler owns its configuration; nothing here is shared across
/// instances.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum concurrently in-flight fetches; persists across frames.
    pub max_loading: usize,
    /// Maximum builds admitted per frame; the counter resets every frame.
    pub max_initializing: usize,
    /// Eviction hysteresis: sweep only above this candidate count.
    pub eviction_hard_cap: usize,
    /// Eviction hysteresis: sweep down to exactly this candidate count.
    pub eviction_soft_cap: usize,
    /// Emit the tile-footprint debug pass.
    pub show_tile_footprints: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_loading: DEFAULT_MAX_LOADING,
            max_initializing: DEFAULT_MAX_INITIALIZING,
            eviction_hard_cap: DEFAULT_EVICTION_HARD_CAP,
            eviction_soft_cap: DEFAULT_EVICTION_SOFT_CAP,
            show_tile_footprints: false,
        }
    }
}

impl SchedulerConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the in-flight fetch cap.
    pub fn with_max_loading(mut self, cap: usize) -> Self {
        self.max_loading = cap;
        self
    }

    /// Set the per-frame build cap.
    pub fn with_max_initializing(mut self, cap: usize) -> Self {
        self.max_initializing = cap;
        self
    }

    /// Set the eviction hysteresis band.
    pub fn with_eviction_band(mut self, soft_cap: usize, hard_cap: usize) -> Self {
        self.eviction_soft_cap = soft_cap;
        self.eviction_hard_cap = hard_cap;
        self
    }

    /// Enable the tile-footprint debug pass.
    pub fn with_tile_footprints(mut self, show: bool) -> Self {
        self.show_tile_footprints = show;
        self
    }
}

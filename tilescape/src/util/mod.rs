//! Small shared utilities.

use std::collections::HashSet;

use parking_lot::Mutex;

/// Deduplicated warning sink.
///
/// Unsupported style input (layer kinds, geometry kinds) tends to repeat on
/// every tile of every frame; each distinct message is logged exactly once
/// per scheduler instance.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: Mutex<HashSet<String>>,
}

impl WarnOnce {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `message` as a warning unless it was emitted before.
    ///
    /// Returns `true` if the warning was actually logged.
    pub fn warn(&self, message: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.insert(message.to_string()) {
            tracing::warn!("{}", message);
            true
        } else {
            false
        }
    }
}

//! Load pool abstraction for tile fetch tasks.
//!
//! The scheduler never awaits a fetch inline; it hands the whole per-tile
//! fetch pass to a [`LoadPool`] and picks the result up from its completion
//! channel on a later frame. Production uses [`TokioLoadPool`];
//! deterministic tests use [`InlineLoadPool`], which runs every task to
//! completion on the calling thread.

use crate::source::BoxFuture;

/// Executes tile fetch tasks.
pub trait LoadPool: Send + Sync {
    /// Run `task` to completion, concurrently with the frame loop or not.
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

/// Load pool spawning onto a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioLoadPool {
    handle: tokio::runtime::Handle,
}

impl TokioLoadPool {
    /// Bind to the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime context.
    pub fn new() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }

    /// Bind to an explicit runtime handle.
    pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Default for TokioLoadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadPool for TokioLoadPool {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.handle.spawn(task);
    }
}

/// Load pool that blocks on every task immediately.
///
/// With sources whose futures resolve without yielding, this makes the whole
/// load pipeline synchronous and deterministic: a fetch spawned during frame
/// `n` is drained from the completion channel at the start of frame `n + 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineLoadPool;

impl LoadPool for InlineLoadPool {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        futures::executor::block_on(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_inline_pool_runs_to_completion() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        InlineLoadPool.spawn(Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
        }));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tokio_pool_runs_task() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        TokioLoadPool::new().spawn(Box::pin(async move {
            let _ = tx.send(7u32);
        }));
        assert_eq!(rx.recv().await, Some(7));
    }
}

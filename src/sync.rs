//! Shared cancellation primitive.
//!
//! This codebase has no async runtime anywhere in its dependency tree,
//! so cancellation is a plain `Arc<AtomicBool>` flag rather than a
//! `tokio_util::CancellationToken` — the same shape this codebase uses
//! for its own daemon and orchestrator shutdown flags.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

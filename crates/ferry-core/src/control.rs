//! Run control: a shared shutdown token.
//!
//! The CLI flips the token on SIGINT/SIGTERM; worker slots check it before
//! claiming their next job. In-flight jobs are not interrupted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable "stop claiming new work" flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every worker slot to stop after its current job. Returns `true`
    /// if shutdown had already been requested.
    pub fn request(&self) -> bool {
        self.requested.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

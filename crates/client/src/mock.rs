//! Test doubles for the client
//!
//! - `RecordingRestart`: restart hook that counts requests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::Restart;

/// Restart hook recording how many restarts were requested
#[derive(Debug, Clone, Default)]
pub struct RecordingRestart {
    count: Arc<AtomicUsize>,
}

impl RecordingRestart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of restarts requested so far
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

impl Restart for RecordingRestart {
    fn restart(&self) {
        tracing::info!("Mock restart: recorded restart request");
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

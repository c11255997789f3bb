//! Client restart hook
//!
//! A 401 from the backend means the session is no longer valid. After the
//! pipeline clears the session it asks the hook to restart the client so the
//! user re-authenticates. What "restart" means is up to the embedding
//! application.

use std::sync::Arc;

use tokio::sync::Notify;

/// Invoked once per unauthorized response, after the session was cleared.
pub trait Restart: Send + Sync {
    fn restart(&self);
}

/// Restart hook that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRestart;

impl Restart for NoopRestart {
    #[mutants::skip]
    fn restart(&self) {
        tracing::info!("Client restart requested, no restart handler installed");
    }
}

/// Restart hook that wakes a task waiting in [`SignalRestart::requested`].
#[derive(Debug, Clone, Default)]
pub struct SignalRestart {
    notify: Arc<Notify>,
}

impl SignalRestart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves once a restart has been requested.
    ///
    /// A request made while nobody is waiting is kept for the next waiter.
    pub async fn requested(&self) {
        self.notify.notified().await;
    }
}

impl Restart for SignalRestart {
    fn restart(&self) {
        tracing::info!("Client restart requested");
        self.notify.notify_one();
    }
}

//! Timer ownership for the recovery loop
//!
//! Exactly one quality-check interval and at most one pending reconnect
//! timer exist per monitored connection. Both handles live here, are
//! replaced only through clear-before-set installers, and die through one
//! idempotent teardown path. The backoff arithmetic itself is
//! [`backoff_delay`](super::state_machine::backoff_delay); the attempt
//! counter lives in the state machine.

use tokio::task::JoinHandle;
use tracing::debug;

/// Owns the recovery-related timer tasks for one monitor
#[derive(Debug, Default)]
pub struct ReconnectScheduler {
    quality_interval: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl ReconnectScheduler {
    /// Create a scheduler with no timers installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the quality-check interval task, cancelling any prior one
    pub fn set_quality_interval(&mut self, handle: JoinHandle<()>) {
        if let Some(prev) = self.quality_interval.take() {
            prev.abort();
        }
        self.quality_interval = Some(handle);
    }

    /// Install the pending reconnect timer, cancelling any prior one
    pub fn set_reconnect_timer(&mut self, handle: JoinHandle<()>) {
        if let Some(prev) = self.reconnect_timer.take() {
            debug!("replacing pending reconnect timer");
            prev.abort();
        }
        self.reconnect_timer = Some(handle);
    }

    /// Cancel the pending reconnect timer, if any
    pub fn clear_reconnect_timer(&mut self) {
        if let Some(handle) = self.reconnect_timer.take() {
            handle.abort();
        }
    }

    /// Whether a reconnect timer is currently pending
    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect_timer
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Cancel everything. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        if let Some(handle) = self.quality_interval.take() {
            handle.abort();
        }
        if let Some(handle) = self.reconnect_timer.take() {
            handle.abort();
        }
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.cleanup();
    }
}

//! Action contract
//!
//! Actions are the atomic units of effect the engine dispatches. The
//! engine never interprets what an action does; it only drives the
//! lifecycle: execute when a handler matches, stop when the handler is
//! halted, dispose when the tree is torn down.
//!
//! A synchronous action completes its effect before `execute` returns and
//! blocks the rest of its leaf's action list. An asynchronous action
//! returns promptly, hands its effect to a background task, and stays
//! logically live until `stop` — the classic example is a button held
//! down until released.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;

/// Action errors
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action: {0}")]
    Unknown(String),

    #[error("invalid action arguments: {0}")]
    InvalidArgs(String),

    #[error("action failed: {0}")]
    Failed(String),
}

/// Result type for action operations
pub type ActionResult<T> = Result<T, ActionError>;

/// An executable unit of effect
///
/// `stop` and `dispose` must be idempotent and safe to call from any
/// thread, including while `execute` is still in flight.
#[async_trait]
pub trait Action: Send + Sync {
    /// Diagnostic name
    fn name(&self) -> &str;

    /// Whether the effect outlives the `execute` call
    fn is_async(&self) -> bool {
        false
    }

    /// Perform the effect
    ///
    /// Synchronous actions return when the effect is done; asynchronous
    /// actions return once the effect has been launched.
    async fn execute(&self) -> ActionResult<()>;

    /// Cooperatively halt the effect
    fn stop(&self);

    /// Release resources; the action will never execute again
    fn dispose(&self) {}
}

/// Action that does nothing
///
/// Useful as a placeholder operation and in tests.
#[derive(Debug, Default)]
pub struct NoopAction;

#[async_trait]
impl Action for NoopAction {
    fn name(&self) -> &str {
        "noop"
    }

    async fn execute(&self) -> ActionResult<()> {
        Ok(())
    }

    fn stop(&self) {}
}

/// Synchronous action that sleeps for a fixed number of seconds
///
/// `stop` cuts the sleep short. The reference implementation of a
/// blocking synchronous action.
#[derive(Debug)]
pub struct WaitAction {
    seconds: f64,
    interrupt: Notify,
    stopped: AtomicBool,
}

impl WaitAction {
    /// Create a wait of `seconds`
    pub fn new(seconds: f64) -> Self {
        Self {
            seconds,
            interrupt: Notify::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Whether the wait was cut short
    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Action for WaitAction {
    fn name(&self) -> &str {
        "wait"
    }

    async fn execute(&self) -> ActionResult<()> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(self.seconds)) => {}
            _ = self.interrupt.notified() => {
                debug!(seconds = self.seconds, "wait interrupted");
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a stop that lands before the
        // sleep registers still interrupts it
        self.interrupt.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_noop_executes() {
        let action = NoopAction;
        assert_eq!(action.name(), "noop");
        assert!(!action.is_async());
        action.execute().await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_sleeps_for_duration() {
        let action = WaitAction::new(0.05);
        let start = Instant::now();
        action.execute().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!action.was_stopped());
    }

    #[tokio::test]
    async fn test_wait_stop_cuts_sleep_short() {
        let action = Arc::new(WaitAction::new(30.0));

        let running = action.clone();
        let task = tokio::spawn(async move { running.execute().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        action.stop();

        task.await.unwrap().unwrap();
        assert!(action.was_stopped());
    }

    #[tokio::test]
    async fn test_wait_stop_before_execute() {
        let action = WaitAction::new(30.0);
        action.stop();
        // The stored permit interrupts the sleep immediately
        action.execute().await.unwrap();
    }
}

//! Tick scheduler
//!
//! The [`Scheduler`] owns the compiled top-level handler list and drives
//! it at a fixed interval. Each tick captures `now`, tries the handlers
//! in order, and stops at the first match — the whole tree behaves as one
//! implicit branch handler. An action failure is logged and the next tick
//! proceeds normally.

use crate::error::EngineResult;
use crate::handler::StateHandler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

/// Default tick interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Polls a handler list at a fixed interval
pub struct Scheduler {
    interval: Duration,
    handlers: Vec<StateHandler>,
    running: AtomicBool,
    disposed: AtomicBool,
    shutdown: Notify,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("handlers", &self.handlers.len())
            .field("running", &self.running)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler over ordered top-level handlers
    pub fn new(interval: Duration, handlers: Vec<StateHandler>) -> Self {
        Self {
            interval,
            handlers,
            running: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// The configured tick interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The top-level handlers in dispatch order
    pub fn handlers(&self) -> &[StateHandler] {
        &self.handlers
    }

    /// Whether the run loop is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One pass over the top-level handlers at `now`
    ///
    /// Returns whether any handler dispatched. First match wins; later
    /// handlers are not evaluated this pass.
    pub async fn tick(&self, now: f64) -> EngineResult<bool> {
        for handler in &self.handlers {
            if handler.check_and_run(now).await? {
                trace!(expr = handler.expr(), "tick dispatched");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Run the tick loop until [`Scheduler::stop`] is called
    ///
    /// Each pass captures the wall clock, ticks, then sleeps out the
    /// interval (or wakes early on stop). A per-tick action failure does
    /// not end the loop. When the loop exits the handler tree is torn
    /// down exactly once.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        debug!(interval = ?self.interval, handlers = self.handlers.len(), "scheduler started");

        while self.running.load(Ordering::SeqCst) {
            let now = wall_clock_secs();
            match self.tick(now).await {
                Ok(matched) => trace!(matched, "tick complete"),
                Err(err) => warn!(error = %err, "tick failed, continuing"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.notified() => {}
            }
        }

        debug!("scheduler stopped");
        self.dispose();
    }

    /// Stop the run loop and halt any dispatch in flight
    ///
    /// The loop owner performs the final teardown when it exits; callers
    /// that never started the loop can call [`Scheduler::dispose`]
    /// directly.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
        for handler in &self.handlers {
            handler.stop_running();
        }
    }

    /// Tear down the handler tree
    ///
    /// Stops then disposes every top-level handler. Runs at most once;
    /// later calls are no-ops.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for handler in &self.handlers {
            handler.stop_running();
            handler.dispose();
        }
    }
}

/// Seconds since the Unix epoch on the wall clock
fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionResult};
    use async_trait::async_trait;
    use opflow_condition::ConditionNode;
    use opflow_state::{StateRecorder, StateRecorderSet};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingAction {
        executes: AtomicUsize,
        disposes: AtomicUsize,
    }

    impl CountingAction {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                executes: AtomicUsize::new(0),
                disposes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Action for CountingAction {
        fn name(&self) -> &str {
            "counting"
        }

        async fn execute(&self) -> ActionResult<()> {
            self.executes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {}

        fn dispose(&self) {
            self.disposes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leaf_on(set: &StateRecorderSet, name: &str, action: Arc<dyn Action>) -> StateHandler {
        let recorder = set.register(StateRecorder::new(name));
        StateHandler::leaf(name, ConditionNode::state(recorder), vec![action])
    }

    #[tokio::test]
    async fn test_tick_first_match_wins_at_top_level() {
        let set = StateRecorderSet::new();
        let first = CountingAction::new();
        let second = CountingAction::new();
        let scheduler = Scheduler::new(
            DEFAULT_INTERVAL,
            vec![
                leaf_on(&set, "a", first.clone()),
                leaf_on(&set, "b", second.clone()),
            ],
        );

        set.record("a", 5.0);
        set.record("b", 5.0);

        assert!(scheduler.tick(10.0).await.unwrap());
        assert_eq!(first.executes.load(Ordering::SeqCst), 1);
        assert_eq!(second.executes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tick_without_match() {
        let set = StateRecorderSet::new();
        let action = CountingAction::new();
        let scheduler = Scheduler::new(DEFAULT_INTERVAL, vec![leaf_on(&set, "a", action.clone())]);

        assert!(!scheduler.tick(10.0).await.unwrap());
        assert_eq!(action.executes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_ticks_repeatedly_until_stopped() {
        let set = StateRecorderSet::new();
        let action = CountingAction::new();
        let scheduler = Arc::new(Scheduler::new(
            Duration::from_millis(5),
            vec![leaf_on(&set, "a", action.clone())],
        ));
        set.record("a", wall_clock_secs());

        let looped = scheduler.clone();
        let task = tokio::spawn(async move { looped.run().await });

        while action.executes.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        scheduler.stop();
        task.await.unwrap();
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_stop_then_run_exit_disposes_exactly_once() {
        let set = StateRecorderSet::new();
        let action = CountingAction::new();
        let scheduler = Arc::new(Scheduler::new(
            Duration::from_millis(5),
            vec![leaf_on(&set, "a", action.clone())],
        ));

        let looped = scheduler.clone();
        let task = tokio::spawn(async move { looped.run().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.stop();
        task.await.unwrap();

        // Teardown already ran when the loop exited
        scheduler.dispose();
        assert_eq!(action.disposes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispose_without_run() {
        let set = StateRecorderSet::new();
        let action = CountingAction::new();
        let scheduler = Scheduler::new(DEFAULT_INTERVAL, vec![leaf_on(&set, "a", action.clone())]);

        scheduler.dispose();
        scheduler.dispose();
        assert_eq!(action.disposes.load(Ordering::SeqCst), 1);
    }
}

//! Handler tree
//!
//! A [`StateHandler`] binds one condition to either an ordered list of
//! child handlers (branch) or an ordered list of actions (leaf). Dispatch
//! is depth-first with first-match-wins: the first node whose condition
//! holds claims the tick, and later siblings are not evaluated.
//!
//! The handler's runtime fields are written by the tick task and may be
//! read and written by a stop request from another task, so they live
//! behind an atomic flag and a small per-handler lock.

use crate::action::Action;
use crate::error::{EngineError, EngineResult};
use opflow_condition::ConditionNode;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// What a matched handler dispatches
pub enum HandlerBody {
    /// Ordered child handlers, tried in declared order
    Branch(Vec<StateHandler>),

    /// Ordered actions, executed in declared order
    Leaf(Vec<Arc<dyn Action>>),
}

/// Runtime bookkeeping for one dispatch
///
/// `current` is the single action mid-call; `live_async` is the working
/// set of asynchronous actions from the current dispatch whose effect is
/// still ongoing. Keeping them separate lets a stop reach an action whose
/// execute call already returned.
#[derive(Default)]
struct RunState {
    current: Option<Arc<dyn Action>>,
    live_async: Vec<Arc<dyn Action>>,
}

/// A condition bound to child handlers or actions
pub struct StateHandler {
    /// Originating expression, kept for diagnostics
    expr: String,

    /// Compiled condition tree
    condition: ConditionNode,

    /// Branch or leaf, never both
    body: HandlerBody,

    /// Whether a dispatch is in progress; flipped off to request a halt
    running: AtomicBool,

    /// Guards against double teardown
    disposed: AtomicBool,

    run_state: Mutex<RunState>,
}

impl StateHandler {
    /// Create a branch handler with ordered children
    pub fn branch(
        expr: impl Into<String>,
        condition: ConditionNode,
        children: Vec<StateHandler>,
    ) -> Self {
        Self::new(expr.into(), condition, HandlerBody::Branch(children))
    }

    /// Create a leaf handler with ordered actions
    pub fn leaf(
        expr: impl Into<String>,
        condition: ConditionNode,
        actions: Vec<Arc<dyn Action>>,
    ) -> Self {
        Self::new(expr.into(), condition, HandlerBody::Leaf(actions))
    }

    fn new(expr: String, condition: ConditionNode, body: HandlerBody) -> Self {
        Self {
            expr,
            condition,
            body,
            running: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            run_state: Mutex::new(RunState::default()),
        }
    }

    /// The expression this handler was compiled from
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Whether a dispatch is currently in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Evaluate the condition at `now` and dispatch on a match
    ///
    /// Returns false with no side effects when the condition does not
    /// hold. On a match a branch delegates to the first child that
    /// returns true; a leaf runs its actions. An action failure is
    /// surfaced to the caller after the handler's bookkeeping is cleared,
    /// so the next tick starts clean.
    pub fn check_and_run<'a>(
        &'a self,
        now: f64,
    ) -> Pin<Box<dyn Future<Output = EngineResult<bool>> + Send + 'a>> {
        Box::pin(async move {
            if !self.condition.evaluate(now) {
                return Ok(false);
            }
            debug!(expr = %self.expr, "condition matched");

            match &self.body {
                HandlerBody::Branch(children) => {
                    for child in children {
                        if child.check_and_run(now).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                HandlerBody::Leaf(actions) => {
                    self.execute_actions(actions).await?;
                    Ok(true)
                }
            }
        })
    }

    /// Run the leaf's actions in declared order
    ///
    /// Synchronous actions block the loop until they return; asynchronous
    /// actions are recorded in the live set before they are invoked, so a
    /// stop racing with the dispatch can still reach them.
    async fn execute_actions(&self, actions: &[Arc<dyn Action>]) -> EngineResult<()> {
        self.running.store(true, Ordering::SeqCst);

        let mut failure = None;
        for action in actions {
            // A concurrent stop_running flips this off mid-list
            if !self.running.load(Ordering::SeqCst) {
                debug!(expr = %self.expr, "dispatch halted mid-list");
                break;
            }

            {
                let mut state = self.lock_run_state();
                state.current = Some(action.clone());
                if action.is_async() {
                    state.live_async.push(action.clone());
                }
            }

            trace!(action = action.name(), "executing action");
            if let Err(err) = action.execute().await {
                failure = Some(EngineError::Action {
                    name: action.name().to_string(),
                    source: err,
                });
                break;
            }
        }

        {
            let mut state = self.lock_run_state();
            state.current = None;
            state.live_async.clear();
        }
        self.running.store(false, Ordering::SeqCst);

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Cooperatively halt this handler and everything below it
    ///
    /// Flips the running flag, recurses into children, stops the action
    /// currently mid-call and every live asynchronous action. An action
    /// that is both current and live is stopped once. Idempotent and safe
    /// when the handler is not running.
    pub fn stop_running(&self) {
        self.running.store(false, Ordering::SeqCst);

        if let HandlerBody::Branch(children) = &self.body {
            for child in children {
                child.stop_running();
            }
        }

        let (current, live_async) = {
            let mut state = self.lock_run_state();
            (state.current.take(), std::mem::take(&mut state.live_async))
        };

        if let Some(current) = current {
            let also_live = live_async.iter().any(|a| Arc::ptr_eq(a, &current));
            if !also_live {
                debug!(action = current.name(), "stopping current action");
                current.stop();
            }
        }
        for action in live_async {
            debug!(action = action.name(), "stopping live async action");
            action.stop();
        }
    }

    /// Permanently tear the handler down
    ///
    /// Halts any dispatch, then disposes owned actions and children. The
    /// condition tree is released when the handler drops; the recorders
    /// it references are untouched. Safe to call more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_running();

        match &self.body {
            HandlerBody::Leaf(actions) => {
                for action in actions {
                    action.dispose();
                }
            }
            HandlerBody::Branch(children) => {
                for child in children {
                    child.dispose();
                }
            }
        }
    }

    fn lock_run_state(&self) -> MutexGuard<'_, RunState> {
        // Recover from poisoning rather than propagate a panic from
        // another task into stop/dispose paths
        self.run_state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

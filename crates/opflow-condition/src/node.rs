//! Condition tree evaluation
//!
//! A [`ConditionNode`] is the compiled form of a condition expression.
//! Evaluation is deterministic given `now` and the referenced recorders,
//! and has no side effects.

use opflow_state::StateRecorder;
use std::sync::Arc;
use tracing::trace;

/// One node of a compiled condition tree
#[derive(Debug, Clone)]
pub enum ConditionNode {
    /// Leaf over a named state with an optional recency window
    ///
    /// True iff the recorder holds a trigger time `t` with
    /// `now - high <= t <= now - low`, both bounds inclusive. `low` is the
    /// minimum staleness (0 = may be arbitrarily fresh), `high` the
    /// maximum age (`None` = arbitrarily old is acceptable).
    State {
        recorder: Arc<StateRecorder>,
        low: f64,
        high: Option<f64>,
    },

    /// Both children must hold
    And(Box<ConditionNode>, Box<ConditionNode>),

    /// Either child must hold
    Or(Box<ConditionNode>, Box<ConditionNode>),

    /// Child must not hold
    Not(Box<ConditionNode>),
}

impl ConditionNode {
    /// Leaf with the default window (any trigger time qualifies)
    pub fn state(recorder: Arc<StateRecorder>) -> Self {
        ConditionNode::State {
            recorder,
            low: 0.0,
            high: None,
        }
    }

    /// Leaf with an explicit window
    pub fn state_in_window(recorder: Arc<StateRecorder>, low: f64, high: Option<f64>) -> Self {
        ConditionNode::State {
            recorder,
            low,
            high,
        }
    }

    /// Combine two nodes with AND
    pub fn and(left: ConditionNode, right: ConditionNode) -> Self {
        ConditionNode::And(Box::new(left), Box::new(right))
    }

    /// Combine two nodes with OR
    pub fn or(left: ConditionNode, right: ConditionNode) -> Self {
        ConditionNode::Or(Box::new(left), Box::new(right))
    }

    /// Negate a node
    pub fn not(child: ConditionNode) -> Self {
        ConditionNode::Not(Box::new(child))
    }

    /// Evaluate the tree at `now`
    ///
    /// AND/OR short-circuit left to right. Never fails: a state that has
    /// never recorded evaluates to false.
    pub fn evaluate(&self, now: f64) -> bool {
        match self {
            ConditionNode::State {
                recorder,
                low,
                high,
            } => {
                let Some(t) = recorder.last_record_time() else {
                    return false;
                };
                let stale_enough = t <= now - low;
                let fresh_enough = high.map_or(true, |h| t >= now - h);
                let result = stale_enough && fresh_enough;
                trace!(state = recorder.state_name(), t, now, result, "leaf evaluated");
                result
            }
            ConditionNode::And(left, right) => left.evaluate(now) && right.evaluate(now),
            ConditionNode::Or(left, right) => left.evaluate(now) || right.evaluate(now),
            ConditionNode::Not(child) => !child.evaluate(now),
        }
    }
}

//! Condition Expressions
//!
//! This crate turns boolean/temporal expressions over named states into
//! evaluable trees.
//!
//! ```text
//! "[dodge, 0, 1] & !stunned | (parry & [attack, 0.2])"
//! ```
//!
//! A leaf references a state by name with an optional recency window;
//! internal nodes combine children with AND/OR/NOT. Parsing resolves every
//! leaf against a [`StateRecorderSet`](opflow_state::StateRecorderSet), so
//! unknown state names fail at compile time. Evaluation is pure and never
//! fails: a state that has never recorded is simply false.
//!
//! # Key Types
//!
//! - [`ConditionNode`] - Evaluable condition tree
//! - [`parse_expr`] - Expression parser bound to a recorder set

pub mod node;
pub mod parse;

pub use node::ConditionNode;
pub use parse::{parse_expr, ExprError, ExprResult};

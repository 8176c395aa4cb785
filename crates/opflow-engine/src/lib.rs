//! Dispatch Engine
//!
//! This crate provides the runtime half of opflow: the action contract,
//! the handler tree, and the tick scheduler.
//!
//! # Architecture
//!
//! ```text
//! SCHEDULER tick → HANDLER TREE (first match wins) → ACTIONS
//! ```
//!
//! - **Actions**: atomic units of effect with execute/stop/dispose and a
//!   synchronous/asynchronous execution mode
//! - **Handlers**: tree nodes binding a condition to child handlers
//!   (branch) or to an ordered action list (leaf)
//! - **Scheduler**: polls the top-level handler list at a fixed interval
//!
//! # Key Types
//!
//! - [`Action`] - The action contract
//! - [`StateHandler`] - Condition + dispatch tree node
//! - [`Scheduler`] - Top-level tick loop

pub mod action;
pub mod error;
pub mod handler;
pub mod scheduler;

pub use action::{Action, ActionError, ActionResult, NoopAction, WaitAction};
pub use error::{EngineError, EngineResult};
pub use handler::{HandlerBody, StateHandler};
pub use scheduler::Scheduler;

//! Engine runtime errors

use crate::action::ActionError;
use thiserror::Error;

/// Errors surfaced by a tick
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("action {name} failed during dispatch: {source}")]
    Action {
        name: String,
        #[source]
        source: ActionError,
    },
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

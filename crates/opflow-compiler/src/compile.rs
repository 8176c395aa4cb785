//! Template expansion and tree construction
//!
//! Compilation walks the declarative entries, splices template references
//! flat into the surrounding list, parses condition expressions against
//! the recorder set, and builds handlers bottom-up. Template expansion is
//! by value: each reference site gets its own independent handler and
//! action instances, never aliased nodes.
//!
//! Cycle detection keeps one "currently expanding" name set per template
//! kind. Handler templates and operation templates live in independent
//! namespaces, so one kind may reference the other freely without
//! forming a cycle in its own namespace.

use crate::config::{HandlerEntry, OperationEntry, SceneConfig};
use crate::template::{ActionFactory, TemplateSource};
use opflow_condition::{parse_expr, ExprError};
use opflow_engine::{Action, ActionError, Scheduler, StateHandler};
use opflow_state::StateRecorderSet;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Which template namespace a reference belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Handler,
    Operation,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Handler => write!(f, "handler"),
            TemplateKind::Operation => write!(f, "operation"),
        }
    }
}

/// Construction-time failures
///
/// Any of these aborts the whole compile; partial trees are not a
/// supported outcome.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{kind} template reference with an empty name")]
    EmptyReferenceName { kind: TemplateKind },

    #[error("{kind} template not found: {name}")]
    UnresolvedTemplate { kind: TemplateKind, name: String },

    #[error("cyclic {kind} template reference: {name}")]
    CyclicTemplateReference { kind: TemplateKind, name: String },

    #[error("state ({expr}) declares no sub-handlers")]
    EmptyBranch { expr: String },

    #[error("state ({expr}) resolves to no operations")]
    EmptyLeaf { expr: String },

    #[error("invalid tick interval: {0}")]
    InvalidInterval(f64),

    #[error("condition expression error: {0}")]
    Expr(#[from] ExprError),

    #[error("failed to build operation {op_name}: {source}")]
    Action {
        op_name: String,
        #[source]
        source: ActionError,
    },
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Compile a scene into a ready-to-run scheduler
pub fn compile_scene(
    config: &SceneConfig,
    recorders: &StateRecorderSet,
    factory: &dyn ActionFactory,
    templates: &dyn TemplateSource,
) -> CompileResult<Scheduler> {
    if !config.interval.is_finite() || config.interval < 0.0 {
        return Err(CompileError::InvalidInterval(config.interval));
    }
    let handlers = build_handlers(
        &config.handlers,
        recorders,
        factory,
        templates,
        &mut HashSet::new(),
    )?;
    debug!(
        interval = config.interval,
        handlers = handlers.len(),
        "scene compiled"
    );
    Ok(Scheduler::new(
        Duration::from_secs_f64(config.interval),
        handlers,
    ))
}

/// Build a handler list, splicing template references flat
fn build_handlers(
    entries: &[HandlerEntry],
    recorders: &StateRecorderSet,
    factory: &dyn ActionFactory,
    templates: &dyn TemplateSource,
    expanding: &mut HashSet<String>,
) -> CompileResult<Vec<StateHandler>> {
    let mut handlers = Vec::new();

    for entry in entries {
        match entry {
            HandlerEntry::Template { state_template } => {
                let expanded = build_handlers_from_template(
                    state_template,
                    recorders,
                    factory,
                    templates,
                    expanding,
                )?;
                handlers.extend(expanded);
            }
            HandlerEntry::Inline {
                states,
                sub_states,
                operations,
            } => {
                handlers.push(build_handler(
                    states,
                    sub_states.as_deref(),
                    operations.as_deref(),
                    recorders,
                    factory,
                    templates,
                    expanding,
                )?);
            }
        }
    }

    Ok(handlers)
}

fn build_handlers_from_template(
    name: &str,
    recorders: &StateRecorderSet,
    factory: &dyn ActionFactory,
    templates: &dyn TemplateSource,
    expanding: &mut HashSet<String>,
) -> CompileResult<Vec<StateHandler>> {
    if name.is_empty() {
        return Err(CompileError::EmptyReferenceName {
            kind: TemplateKind::Handler,
        });
    }
    if expanding.contains(name) {
        return Err(CompileError::CyclicTemplateReference {
            kind: TemplateKind::Handler,
            name: name.to_string(),
        });
    }
    let template =
        templates
            .handler_template(name)
            .ok_or_else(|| CompileError::UnresolvedTemplate {
                kind: TemplateKind::Handler,
                name: name.to_string(),
            })?;

    expanding.insert(name.to_string());
    let handlers = build_handlers(&template.handlers, recorders, factory, templates, expanding);
    expanding.remove(name);

    handlers
}

/// Build one handler from an inline entry
///
/// `sub_states` makes a branch; otherwise the resolved operations make a
/// leaf. The handler-template guard set flows through nested sub-states;
/// each leaf starts a fresh guard set for its operation templates.
fn build_handler(
    states: &str,
    sub_states: Option<&[HandlerEntry]>,
    operations: Option<&[OperationEntry]>,
    recorders: &StateRecorderSet,
    factory: &dyn ActionFactory,
    templates: &dyn TemplateSource,
    expanding: &mut HashSet<String>,
) -> CompileResult<StateHandler> {
    let condition = parse_expr(states, recorders)?;

    if let Some(sub_entries) = sub_states {
        if sub_entries.is_empty() {
            return Err(CompileError::EmptyBranch {
                expr: states.to_string(),
            });
        }
        let children = build_handlers(sub_entries, recorders, factory, templates, expanding)?;
        Ok(StateHandler::branch(states, condition, children))
    } else {
        let actions = build_operations(
            operations.unwrap_or_default(),
            factory,
            templates,
            &mut HashSet::new(),
        )?;
        if actions.is_empty() {
            return Err(CompileError::EmptyLeaf {
                expr: states.to_string(),
            });
        }
        Ok(StateHandler::leaf(states, condition, actions))
    }
}

/// Build an action list, splicing operation-template references flat
fn build_operations(
    entries: &[OperationEntry],
    factory: &dyn ActionFactory,
    templates: &dyn TemplateSource,
    expanding: &mut HashSet<String>,
) -> CompileResult<Vec<Arc<dyn Action>>> {
    let mut actions = Vec::new();

    for entry in entries {
        match entry {
            OperationEntry::Template { operation_template } => {
                let expanded =
                    build_operations_from_template(operation_template, factory, templates, expanding)?;
                actions.extend(expanded);
            }
            OperationEntry::Op { op_name, data } => {
                let action =
                    factory
                        .build(op_name, data)
                        .map_err(|source| CompileError::Action {
                            op_name: op_name.clone(),
                            source,
                        })?;
                actions.push(action);
            }
        }
    }

    Ok(actions)
}

fn build_operations_from_template(
    name: &str,
    factory: &dyn ActionFactory,
    templates: &dyn TemplateSource,
    expanding: &mut HashSet<String>,
) -> CompileResult<Vec<Arc<dyn Action>>> {
    if name.is_empty() {
        return Err(CompileError::EmptyReferenceName {
            kind: TemplateKind::Operation,
        });
    }
    if expanding.contains(name) {
        return Err(CompileError::CyclicTemplateReference {
            kind: TemplateKind::Operation,
            name: name.to_string(),
        });
    }
    let template =
        templates
            .operation_template(name)
            .ok_or_else(|| CompileError::UnresolvedTemplate {
                kind: TemplateKind::Operation,
                name: name.to_string(),
            })?;

    expanding.insert(name.to_string());
    let actions = build_operations(&template.operations, factory, templates, expanding);
    expanding.remove(name);

    actions
}

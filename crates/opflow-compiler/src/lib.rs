//! Scene Compiler
//!
//! This crate turns declarative scene configuration into an executable
//! [`Scheduler`](opflow_engine::Scheduler). It resolves named templates
//! (of handlers and of operations) by value at each reference site,
//! detects reference cycles per template kind, builds condition trees
//! against the known recorder set, and constructs actions through a
//! caller-supplied factory.
//!
//! All failures are construction-time failures: a bad configuration
//! aborts the whole compile, and the resulting tree is never partial.
//!
//! # Key Types
//!
//! - [`SceneConfig`] - Declarative scene shape
//! - [`ActionFactory`] / [`TemplateSource`] - Resolver seams
//! - [`compile_scene`] - Configuration to scheduler
//! - [`CompileError`] - The construction-failure taxonomy

pub mod compile;
pub mod config;
pub mod template;

pub use compile::{compile_scene, CompileError, CompileResult, TemplateKind};
pub use config::{HandlerEntry, OperationEntry, SceneConfig};
pub use template::{
    ActionFactory, HandlerTemplate, OperationTemplate, TemplateLibrary, TemplateSource,
};

//! Resolver seams
//!
//! The compiler does not know how to build actions or where template
//! fragments live; both capabilities are injected. [`ActionFactory`]
//! maps an `(op_name, data)` pair to a constructed action, and
//! [`TemplateSource`] looks up named fragments per template kind.
//! [`TemplateLibrary`] is a ready-made in-memory source.

use crate::config::{HandlerEntry, OperationEntry};
use opflow_engine::{Action, ActionResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A named, reusable fragment of handler entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerTemplate {
    #[serde(default)]
    pub handlers: Vec<HandlerEntry>,
}

/// A named, reusable fragment of operation entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationTemplate {
    #[serde(default)]
    pub operations: Vec<OperationEntry>,
}

/// Builds actions from declarative operation entries
///
/// Unknown names and malformed arguments are the factory's failures, but
/// they propagate as construction-time compile errors.
pub trait ActionFactory: Send + Sync {
    fn build(&self, op_name: &str, data: &[String]) -> ActionResult<Arc<dyn Action>>;
}

impl<F> ActionFactory for F
where
    F: Fn(&str, &[String]) -> ActionResult<Arc<dyn Action>> + Send + Sync,
{
    fn build(&self, op_name: &str, data: &[String]) -> ActionResult<Arc<dyn Action>> {
        self(op_name, data)
    }
}

/// Looks up template fragments by name, one namespace per kind
pub trait TemplateSource: Send + Sync {
    fn handler_template(&self, name: &str) -> Option<HandlerTemplate>;

    fn operation_template(&self, name: &str) -> Option<OperationTemplate>;
}

/// In-memory template source
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    handler_templates: HashMap<String, HandlerTemplate>,
    operation_templates: HashMap<String, OperationTemplate>,
}

impl TemplateLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler template under `name`
    pub fn add_handler_template(&mut self, name: impl Into<String>, template: HandlerTemplate) {
        self.handler_templates.insert(name.into(), template);
    }

    /// Register an operation template under `name`
    pub fn add_operation_template(
        &mut self,
        name: impl Into<String>,
        template: OperationTemplate,
    ) {
        self.operation_templates.insert(name.into(), template);
    }
}

impl TemplateSource for TemplateLibrary {
    fn handler_template(&self, name: &str) -> Option<HandlerTemplate> {
        self.handler_templates.get(name).cloned()
    }

    fn operation_template(&self, name: &str) -> Option<OperationTemplate> {
        self.operation_templates.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_lookup() {
        let mut library = TemplateLibrary::new();
        library.add_operation_template(
            "recover",
            OperationTemplate {
                operations: vec![OperationEntry::Op {
                    op_name: "heal".to_string(),
                    data: vec![],
                }],
            },
        );

        assert!(library.operation_template("recover").is_some());
        assert!(library.operation_template("missing").is_none());
        assert!(library.handler_template("recover").is_none());
    }

    #[test]
    fn test_template_deserialization() {
        let yaml = r#"
handlers:
  - states: "dodge"
    operations:
      - op_name: press
"#;
        let template: HandlerTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(template.handlers.len(), 1);
    }
}

//! Declarative configuration shapes
//!
//! These are the serde models the compiler consumes. How they are loaded
//! (YAML files, JSON over a socket, built in code) is the caller's
//! business; any structured format that deserializes into these shapes
//! works.

use serde::{Deserialize, Serialize};

fn default_interval() -> f64 {
    0.5
}

/// A complete scene: tick interval plus ordered top-level handlers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Tick interval in seconds
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Top-level handler entries, tried in order each tick
    #[serde(default)]
    pub handlers: Vec<HandlerEntry>,
}

/// One handler entry: a template reference or an inline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerEntry {
    /// Splice the named handler template's entries in at this position
    Template {
        state_template: String,
    },

    /// Inline handler with exactly one of `sub_states`/`operations`
    Inline {
        /// Condition expression over state names
        states: String,

        /// Child handler entries (branch)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sub_states: Option<Vec<HandlerEntry>>,

        /// Operation entries (leaf)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operations: Option<Vec<OperationEntry>>,
    },
}

/// One operation entry: a template reference or a concrete operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationEntry {
    /// Splice the named operation template's entries in at this position
    Template {
        operation_template: String,
    },

    /// Concrete operation passed to the action factory
    Op {
        op_name: String,

        /// Positional string arguments for the factory
        #[serde(default)]
        data: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_defaults() {
        let scene: SceneConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(scene.interval, 0.5);
        assert!(scene.handlers.is_empty());
    }

    #[test]
    fn test_inline_handler_with_operations() {
        let yaml = r#"
interval: 1
handlers:
  - states: "[dodge, 0, 1] & !stunned"
    operations:
      - op_name: press
        data: ["space"]
      - operation_template: recover
"#;
        let scene: SceneConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scene.interval, 1.0);
        assert_eq!(scene.handlers.len(), 1);

        let HandlerEntry::Inline {
            states, operations, ..
        } = &scene.handlers[0]
        else {
            panic!("expected inline handler");
        };
        assert_eq!(states, "[dodge, 0, 1] & !stunned");

        let ops = operations.as_ref().unwrap();
        assert!(matches!(&ops[0], OperationEntry::Op { op_name, data }
            if op_name == "press" && data == &vec!["space".to_string()]));
        assert!(matches!(&ops[1], OperationEntry::Template { operation_template }
            if operation_template == "recover"));
    }

    #[test]
    fn test_handler_template_reference() {
        let yaml = r#"
handlers:
  - state_template: common_dodge
"#;
        let scene: SceneConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(&scene.handlers[0], HandlerEntry::Template { state_template }
            if state_template == "common_dodge"));
    }

    #[test]
    fn test_nested_sub_states() {
        let yaml = r#"
handlers:
  - states: "combat"
    sub_states:
      - states: "boss"
        operations:
          - op_name: ultimate
"#;
        let scene: SceneConfig = serde_yaml::from_str(yaml).unwrap();
        let HandlerEntry::Inline { sub_states, .. } = &scene.handlers[0] else {
            panic!("expected inline handler");
        };
        assert_eq!(sub_states.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_op_data_defaults_to_empty() {
        let json = r#"{"op_name": "noop"}"#;
        let op: OperationEntry = serde_json::from_str(json).unwrap();
        assert!(matches!(op, OperationEntry::Op { ref data, .. } if data.is_empty()));
    }
}

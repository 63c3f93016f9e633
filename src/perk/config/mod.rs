// SPDX-License-Identifier: MIT

//! Rule document schema
//!
//! The rule document is the user-authored YAML file that shapes engine
//! behavior at runtime. It carries a version tag, engine tuning, and an
//! ordered list of scenarios whose children form the decision tree.

mod loader;
mod validator;

pub use loader::{Loader, WatchHandle};
pub use validator::validate;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level rule document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

/// Tunable concurrency settings, with production defaults applied for any
/// field the document omits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_event_workers")]
    pub event_workers: usize,
    #[serde(default = "default_action_workers")]
    pub action_workers: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_event_timeout_ms")]
    pub event_timeout_ms: u64,
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            event_workers: default_event_workers(),
            action_workers: default_action_workers(),
            queue_depth: default_queue_depth(),
            event_timeout_ms: default_event_timeout_ms(),
            fail_open: default_fail_open(),
        }
    }
}

fn default_event_workers() -> usize {
    32
}

fn default_action_workers() -> usize {
    16
}

fn default_queue_depth() -> usize {
    10_000
}

fn default_event_timeout_ms() -> u64 {
    5_000
}

fn default_fail_open() -> bool {
    true
}

/// An entry point that filters events by type and optional source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub event_types: Vec<String>,
    /// Empty means any source.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub children: Vec<NodeRef>,
}

/// A child slot holding exactly one of a condition or an action; the
/// validator rejects documents where both or neither are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionDef>,
}

/// A boolean expression gating its children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub children: Vec<NodeRef>,
}

/// A leaf naming an action type and its params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults_applied() {
        let doc: RuleDocument = serde_yaml::from_str("version: v1\n").unwrap();
        assert_eq!(doc.engine.event_workers, 32);
        assert_eq!(doc.engine.action_workers, 16);
        assert_eq!(doc.engine.queue_depth, 10_000);
        assert_eq!(doc.engine.event_timeout_ms, 5_000);
        assert!(doc.engine.fail_open);
    }

    #[test]
    fn test_engine_overrides() {
        let doc: RuleDocument = serde_yaml::from_str(
            r#"
version: v1
engine:
  event_workers: 2
  queue_depth: 50
"#,
        )
        .unwrap();
        assert_eq!(doc.engine.event_workers, 2);
        assert_eq!(doc.engine.queue_depth, 50);
        // untouched fields keep their defaults
        assert_eq!(doc.engine.event_timeout_ms, 5_000);
    }

    #[test]
    fn test_full_document_roundtrip() {
        let doc: RuleDocument = serde_yaml::from_str(
            r#"
version: v1
scenarios:
  - id: sc_food_high
    description: High-value food purchases
    enabled: true
    event_types: [transaction]
    sources: [pos-system]
    children:
      - condition:
          id: cond_food
          expression: payload.category == "food"
          children:
            - action:
                id: act_bonus
                type: reward_points
                params:
                  operation: award
                  points_formula: "payload.amount * 0.05"
"#,
        )
        .unwrap();
        assert_eq!(doc.scenarios.len(), 1);
        let scenario = &doc.scenarios[0];
        assert!(scenario.enabled);
        assert_eq!(scenario.event_types, vec!["transaction"]);
        let condition = scenario.children[0].condition.as_ref().unwrap();
        assert_eq!(condition.id, "cond_food");
        let action = condition.children[0].action.as_ref().unwrap();
        assert_eq!(action.action_type, "reward_points");
        assert_eq!(
            action.params["points_formula"],
            serde_json::json!("payload.amount * 0.05")
        );
    }

    #[test]
    fn test_enabled_defaults_to_false() {
        let doc: RuleDocument = serde_yaml::from_str(
            r#"
version: v1
scenarios:
  - id: sc
    event_types: [login]
"#,
        )
        .unwrap();
        assert!(!doc.scenarios[0].enabled);
    }
}

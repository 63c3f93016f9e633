// SPDX-License-Identifier: MIT

//! Graph construction from a validated rule document
//!
//! All condition expressions are compiled into ASTs here and every action's
//! params go through its executor's validate hook, so a broken document
//! aborts the build (and a hot reload keeps the previous graph) instead of
//! failing at evaluation time.

use super::graph::Graph;
use super::node::{ActionNode, ConditionNode, Node, ScenarioNode};
use crate::perk::action::ActionRegistry;
use crate::perk::condition;
use crate::perk::config::{NodeRef, RuleDocument};
use crate::perk::error::BuildError;
use std::sync::Arc;

/// Build a graph from a pre-validated rule document.
///
/// Disabled scenarios are skipped entirely; they are absent from the
/// resulting graph, not merely inert.
pub fn build(doc: &RuleDocument, registry: &ActionRegistry) -> Result<Graph, BuildError> {
    let mut graph = Graph::default();
    for scenario in &doc.scenarios {
        if !scenario.enabled {
            continue;
        }
        let node = Arc::new(Node::Scenario(ScenarioNode::new(
            &scenario.id,
            &scenario.event_types,
            &scenario.sources,
        )));
        graph.add_node(node)?;
        build_children(&mut graph, &scenario.id, &scenario.children, registry)?;
    }
    Ok(graph)
}

fn build_children(
    graph: &mut Graph,
    parent_id: &str,
    refs: &[NodeRef],
    registry: &ActionRegistry,
) -> Result<(), BuildError> {
    for node_ref in refs {
        if let Some(condition_def) = &node_ref.condition {
            let expr = condition::parse(&condition_def.expression).map_err(|source| {
                BuildError::ConditionParse {
                    id: condition_def.id.clone(),
                    expression: condition_def.expression.clone(),
                    source,
                }
            })?;
            let node = Arc::new(Node::Condition(ConditionNode::new(&condition_def.id, expr)));
            graph.add_node(node.clone())?;
            graph.add_edge(parent_id, node);
            build_children(graph, &condition_def.id, &condition_def.children, registry)?;
        } else if let Some(action_def) = &node_ref.action {
            let executor = registry.get(&action_def.action_type).map_err(|_| {
                BuildError::UnknownActionType {
                    id: action_def.id.clone(),
                    type_key: action_def.action_type.clone(),
                }
            })?;
            executor.validate(&action_def.params).map_err(|e| {
                BuildError::InvalidActionParams {
                    id: action_def.id.clone(),
                    message: e.to_string(),
                }
            })?;
            let node = Arc::new(Node::Action(ActionNode::new(
                &action_def.id,
                &action_def.action_type,
                action_def.params.clone(),
            )));
            graph.add_node(node.clone())?;
            graph.add_edge(parent_id, node);
            // Actions are leaves; they have no children.
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perk::action::{ActionExecutor, ActionResult};
    use crate::perk::dag::node::EvalContext;
    use crate::perk::error::PerkError;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug)]
    struct AcceptAllAction;

    #[async_trait]
    impl ActionExecutor for AcceptAllAction {
        fn type_key(&self) -> &str {
            "accept_all"
        }

        fn validate(&self, _params: &Map<String, Value>) -> Result<(), PerkError> {
            Ok(())
        }

        async fn execute(
            &self,
            _cancel: &CancellationToken,
            action_id: &str,
            _params: &Map<String, Value>,
            _ctx: &mut EvalContext<'_>,
        ) -> Result<ActionResult, PerkError> {
            Ok(ActionResult {
                action_id: action_id.to_string(),
                action_type: self.type_key().to_string(),
                success: true,
                message: String::new(),
            })
        }
    }

    #[derive(Debug)]
    struct RejectingAction;

    #[async_trait]
    impl ActionExecutor for RejectingAction {
        fn type_key(&self) -> &str {
            "rejecting"
        }

        fn validate(&self, _params: &Map<String, Value>) -> Result<(), PerkError> {
            Err(PerkError::action("params always invalid"))
        }

        async fn execute(
            &self,
            _cancel: &CancellationToken,
            action_id: &str,
            _params: &Map<String, Value>,
            _ctx: &mut EvalContext<'_>,
        ) -> Result<ActionResult, PerkError> {
            Ok(ActionResult {
                action_id: action_id.to_string(),
                action_type: self.type_key().to_string(),
                success: true,
                message: String::new(),
            })
        }
    }

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(AcceptAllAction));
        registry.register(Arc::new(RejectingAction));
        registry
    }

    fn doc(yaml: &str) -> RuleDocument {
        serde_yaml::from_str(yaml).unwrap()
    }

    const NESTED: &str = r#"
version: v1
scenarios:
  - id: sc_food_high
    enabled: true
    event_types: [transaction]
    sources: [pos-system]
    children:
      - condition:
          id: cond_food
          expression: payload.category == "food"
          children:
            - condition:
                id: cond_amount
                expression: payload.amount > 1000
                children:
                  - action:
                      id: act_bonus
                      type: accept_all
                      params: {}
"#;

    #[test]
    fn test_build_nested_graph() {
        let graph = build(&doc(NESTED), &registry()).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.roots().len(), 1);
        assert_eq!(graph.children("sc_food_high").len(), 1);
        assert_eq!(graph.children("cond_food")[0].id(), "cond_amount");
        assert_eq!(graph.children("cond_amount")[0].id(), "act_bonus");
        assert!(graph.children("act_bonus").is_empty());
    }

    #[test]
    fn test_build_is_deterministic() {
        let document = doc(NESTED);
        let reg = registry();
        let a = build(&document, &reg).unwrap();
        let b = build(&document, &reg).unwrap();
        assert_eq!(a.node_count(), b.node_count());
        let ids_a: Vec<&str> = a.roots().iter().map(|n| n.id()).collect();
        let ids_b: Vec<&str> = b.roots().iter().map(|n| n.id()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_disabled_scenario_absent() {
        let graph = build(
            &doc(r#"
version: v1
scenarios:
  - id: sc_off
    enabled: false
    event_types: [transaction]
    children:
      - action:
          id: act_never
          type: accept_all
          params: {}
"#),
            &registry(),
        )
        .unwrap();
        assert_eq!(graph.node_count(), 0);
        assert!(graph.roots().is_empty());
        assert!(graph.node("act_never").is_none());
    }

    #[test]
    fn test_bad_expression_fails_build() {
        let err = build(
            &doc(r#"
version: v1
scenarios:
  - id: sc
    enabled: true
    event_types: [transaction]
    children:
      - condition:
          id: cond_broken
          expression: "amount >"
          children: []
"#),
            &registry(),
        )
        .unwrap_err();
        match err {
            BuildError::ConditionParse { id, .. } => assert_eq!(id, "cond_broken"),
            other => panic!("expected ConditionParse, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_action_type_fails_build() {
        let err = build(
            &doc(r#"
version: v1
scenarios:
  - id: sc
    enabled: true
    event_types: [transaction]
    children:
      - action:
          id: act
          type: no_such_type
          params: {}
"#),
            &registry(),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::UnknownActionType { .. }));
    }

    #[test]
    fn test_validate_hook_rejection_fails_build() {
        let err = build(
            &doc(r#"
version: v1
scenarios:
  - id: sc
    enabled: true
    event_types: [transaction]
    children:
      - action:
          id: act
          type: rejecting
          params: {}
"#),
            &registry(),
        )
        .unwrap_err();
        match err {
            BuildError::InvalidActionParams { id, message } => {
                assert_eq!(id, "act");
                assert!(message.contains("always invalid"));
            }
            other => panic!("expected InvalidActionParams, got {other:?}"),
        }
    }
}

// SPDX-License-Identifier: MIT

//! DAG node variants and the per-event evaluation context

use crate::perk::condition::{self, Expr, Resolver};
use crate::perk::error::ExprError;
use crate::perk::event::Event;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Per-event scratch carried through the DFS traversal and action
/// execution. Owned by a single worker; never shared.
pub struct EvalContext<'a> {
    /// The event under evaluation.
    pub event: &'a Event,
    /// Action outputs keyed by action id, for downstream consumption
    /// within the same event.
    pub results: HashMap<String, Value>,
    /// Non-fatal errors collected during the traversal (fail-open).
    pub errors: Vec<String>,
}

impl<'a> EvalContext<'a> {
    pub fn new(event: &'a Event) -> Self {
        Self {
            event,
            results: HashMap::new(),
            errors: Vec::new(),
        }
    }
}

/// Field resolution over the event:
/// - `payload.<k1>.<k2>...` walks nested payload mappings
/// - `meta.<k>` looks up the string metadata
/// - `event.type` / `event.source` / `event.actor_id` / `event.id` expose
///   the fixed fields
///
/// Any other root segment resolves to nothing.
impl Resolver for EvalContext<'_> {
    fn resolve(&self, path: &[String]) -> Option<Value> {
        match path.first()?.as_str() {
            "payload" => resolve_map(&self.event.payload, &path[1..]),
            "meta" => {
                if path.len() != 2 {
                    return None;
                }
                self.event
                    .meta
                    .get(&path[1])
                    .map(|v| Value::String(v.clone()))
            }
            "event" => {
                if path.len() != 2 {
                    return None;
                }
                let value = match path[1].as_str() {
                    "type" => &self.event.event_type,
                    "source" => &self.event.source,
                    "actor_id" => &self.event.actor_id,
                    "id" => &self.event.id,
                    _ => return None,
                };
                Some(Value::String(value.clone()))
            }
            _ => None,
        }
    }
}

fn resolve_map(map: &Map<String, Value>, path: &[String]) -> Option<Value> {
    let (first, rest) = path.split_first()?;
    let value = map.get(first)?;
    if rest.is_empty() {
        return Some(value.clone());
    }
    match value {
        Value::Object(inner) => resolve_map(inner, rest),
        _ => None,
    }
}

/// A compiled DAG node.
#[derive(Debug)]
pub enum Node {
    Scenario(ScenarioNode),
    Condition(ConditionNode),
    Action(ActionNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Scenario(n) => &n.id,
            Node::Condition(n) => &n.id,
            Node::Action(n) => &n.id,
        }
    }

    /// Whether the traversal may pass through this node for the event in
    /// `ctx`. Action nodes always pass; they are leaves and executing them
    /// is the engine's job, not the traversal's.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool, ExprError> {
        match self {
            Node::Scenario(n) => Ok(n.accepts(ctx.event)),
            Node::Condition(n) => condition::evaluate(&n.expr, ctx),
            Node::Action(_) => Ok(true),
        }
    }

    pub fn as_action(&self) -> Option<&ActionNode> {
        match self {
            Node::Action(n) => Some(n),
            _ => None,
        }
    }
}

/// Root entry point keyed by event type and optional source filter.
#[derive(Debug)]
pub struct ScenarioNode {
    pub(crate) id: String,
    event_types: HashSet<String>,
    /// Empty means any source is accepted.
    sources: HashSet<String>,
}

impl ScenarioNode {
    pub fn new(id: impl Into<String>, event_types: &[String], sources: &[String]) -> Self {
        Self {
            id: id.into(),
            event_types: event_types.iter().map(|t| t.to_lowercase()).collect(),
            sources: sources.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Case-insensitive on both the filter and the event fields.
    fn accepts(&self, event: &Event) -> bool {
        if !self.event_types.contains(&event.event_type.to_lowercase()) {
            return false;
        }
        self.sources.is_empty() || self.sources.contains(&event.source.to_lowercase())
    }
}

/// Internal node gating descent by a pre-compiled boolean expression.
#[derive(Debug)]
pub struct ConditionNode {
    pub(crate) id: String,
    pub(crate) expr: Expr,
}

impl ConditionNode {
    pub fn new(id: impl Into<String>, expr: Expr) -> Self {
        Self {
            id: id.into(),
            expr,
        }
    }
}

/// Leaf node naming an action to execute with its params.
#[derive(Debug)]
pub struct ActionNode {
    pub(crate) id: String,
    pub(crate) action_type: String,
    pub(crate) params: Map<String, Value>,
}

impl ActionNode {
    pub fn new(
        id: impl Into<String>,
        action_type: impl Into<String>,
        params: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            action_type: action_type.into(),
            params,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }
}

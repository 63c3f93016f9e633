// SPDX-License-Identifier: MIT

//! Depth-first traversal with branch pruning

use super::graph::Graph;
use super::node::{EvalContext, Node};
use crate::perk::event::Event;
use std::sync::Arc;

/// A triggered action discovered during traversal.
#[derive(Debug, Clone)]
pub struct ActionMatch {
    pub scenario_id: String,
    pub node: Arc<Node>,
}

/// Outcome of one traversal: matched actions in DFS pre-order, matched
/// scenario ids in document order, and the context (accumulator + errors)
/// for the action execution phase.
pub struct Evaluation<'a> {
    pub matches: Vec<ActionMatch>,
    pub scenarios_matched: Vec<String>,
    pub ctx: EvalContext<'a>,
}

/// Run the event through every matching scenario of the graph.
///
/// Failing nodes are fail-open: the error is recorded, the branch is
/// pruned, and sibling branches still evaluate. A scenario only counts as
/// matched when at least one action was reached beneath it.
pub fn evaluate<'a>(graph: &Graph, event: &'a Event) -> Evaluation<'a> {
    let mut ctx = EvalContext::new(event);
    let mut matches = Vec::new();
    let mut scenarios_matched = Vec::new();

    for root in graph.roots() {
        let passed = match root.evaluate(&ctx) {
            Ok(passed) => passed,
            Err(e) => {
                ctx.errors.push(format!("scenario {}: {e}", root.id()));
                continue;
            }
        };
        if !passed {
            continue;
        }
        let before = matches.len();
        dfs(graph, &mut ctx, root.id(), root.id(), &mut matches);
        if matches.len() > before {
            scenarios_matched.push(root.id().to_string());
        }
    }

    Evaluation {
        matches,
        scenarios_matched,
        ctx,
    }
}

fn dfs(
    graph: &Graph,
    ctx: &mut EvalContext<'_>,
    parent_id: &str,
    scenario_id: &str,
    matches: &mut Vec<ActionMatch>,
) {
    for child in graph.children(parent_id) {
        let passed = match child.evaluate(ctx) {
            Ok(passed) => passed,
            Err(e) => {
                ctx.errors.push(format!("node {}: {e}", child.id()));
                continue;
            }
        };
        if !passed {
            continue;
        }
        if child.as_action().is_some() {
            matches.push(ActionMatch {
                scenario_id: scenario_id.to_string(),
                node: child.clone(),
            });
        } else {
            dfs(graph, ctx, child.id(), scenario_id, matches);
        }
    }
}

// SPDX-License-Identifier: MIT

//! Immutable decision DAG compiled from a rule document
//!
//! A graph is built once per rule-document revision with every condition
//! expression compiled up front, then shared read-only across all workers.
//! Hot-reload builds a new graph and swaps an atomic pointer; nothing here
//! is ever mutated after construction.

mod builder;
mod evaluator;
mod graph;
mod node;

pub use builder::build;
pub use evaluator::{evaluate, ActionMatch, Evaluation};
pub use graph::Graph;
pub use node::{ActionNode, ConditionNode, EvalContext, Node, ScenarioNode};

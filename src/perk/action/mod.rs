// SPDX-License-Identifier: MIT

//! Action contract and implementations
//!
//! Actions are the side effects a matched rule triggers. Each action type
//! implements [`ActionExecutor`] and is registered once at startup; the
//! graph builder calls `validate` for every action node, the engine calls
//! `execute` for every triggered match.

pub mod points;
pub mod registry;

pub use points::RewardPointsAction;
pub use registry::ActionRegistry;

use crate::perk::dag::EvalContext;
use crate::perk::error::PerkError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// Outcome of executing a single action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub action_id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub success: bool,
    pub message: String,
}

/// Capability interface all action implementations satisfy.
#[async_trait]
pub trait ActionExecutor: Send + Sync + std::fmt::Debug {
    /// The string key this executor is registered under.
    fn type_key(&self) -> &str;

    /// Check params at graph build time.
    fn validate(&self, params: &Map<String, Value>) -> Result<(), PerkError>;

    /// Run the action for one triggered match.
    ///
    /// Implementations record their output in `ctx.results` under the
    /// action id so later actions of the same event can consume it.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        action_id: &str,
        params: &Map<String, Value>,
        ctx: &mut EvalContext<'_>,
    ) -> Result<ActionResult, PerkError>;
}

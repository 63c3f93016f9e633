// SPDX-License-Identifier: MIT

//! Reference action: award or deduct loyalty points
//!
//! Recognized params:
//! - `operation`: `"award"` or `"deduct"` (required)
//! - `points`: fixed numeric amount, or
//! - `points_formula`: arithmetic expression over event fields, e.g.
//!   `"payload.amount * 0.05"` (exactly one of the two)
//! - `reason`: optional free-form string appended to the message

use super::{ActionExecutor, ActionResult};
use crate::perk::condition;
use crate::perk::dag::EvalContext;
use crate::perk::error::PerkError;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct RewardPointsAction;

impl RewardPointsAction {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RewardPointsAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionExecutor for RewardPointsAction {
    fn type_key(&self) -> &str {
        "reward_points"
    }

    fn validate(&self, params: &Map<String, Value>) -> Result<(), PerkError> {
        let operation = params
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if operation != "award" && operation != "deduct" {
            return Err(PerkError::action(format!(
                "reward_points: operation must be 'award' or 'deduct', got {operation:?}"
            )));
        }
        match (
            params.contains_key("points"),
            params.contains_key("points_formula"),
        ) {
            (true, true) => {
                return Err(PerkError::action(
                    "reward_points: only one of 'points' or 'points_formula' may be set",
                ))
            }
            (false, false) => {
                return Err(PerkError::action(
                    "reward_points: one of 'points' or 'points_formula' is required",
                ))
            }
            _ => {}
        }
        // Surface a broken formula at build time rather than on the first
        // matching event.
        if let Some(formula) = params.get("points_formula").and_then(Value::as_str) {
            condition::parse(formula).map_err(|e| {
                PerkError::action(format!("reward_points: points_formula: {e}"))
            })?;
        }
        Ok(())
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        action_id: &str,
        params: &Map<String, Value>,
        ctx: &mut EvalContext<'_>,
    ) -> Result<ActionResult, PerkError> {
        let operation = params
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or("award");
        let reason = params.get("reason").and_then(Value::as_str);

        let amount = resolve_points(params, ctx)?;
        let amount = (amount * 100.0).round() / 100.0;

        let verb = if operation == "deduct" {
            "Deducted"
        } else {
            "Awarded"
        };
        let mut message = format!("{verb} {amount} points to {}", ctx.event.actor_id);
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            message.push_str(" — ");
            message.push_str(reason);
        }

        // A real deployment would append to a points ledger here; the
        // accumulator entry is what downstream actions of the same event see.
        ctx.results.insert(
            action_id.to_string(),
            json!({
                "operation": operation,
                "points": amount,
                "actor_id": ctx.event.actor_id,
            }),
        );

        Ok(ActionResult {
            action_id: action_id.to_string(),
            action_type: self.type_key().to_string(),
            success: true,
            message,
        })
    }
}

/// The amount comes from either the fixed param or the formula evaluated
/// against the event.
fn resolve_points(params: &Map<String, Value>, ctx: &EvalContext<'_>) -> Result<f64, PerkError> {
    if let Some(formula) = params.get("points_formula").and_then(Value::as_str) {
        if !formula.is_empty() {
            let expr = condition::parse(formula)
                .map_err(|e| PerkError::action(format!("points_formula parse error: {e}")))?;
            return condition::evaluate_formula(&expr, ctx)
                .map_err(|e| PerkError::action(format!("points_formula eval error: {e}")));
        }
    }
    if let Some(points) = params.get("points").and_then(Value::as_f64) {
        return Ok(points);
    }
    Err(PerkError::action("cannot resolve points value"))
}

// SPDX-License-Identifier: MIT

//! Structural validation of rule documents
//!
//! Collects every problem before reporting, so one validation run tells
//! the author about all of them at once.

use super::{NodeRef, RuleDocument};
use crate::perk::error::ValidationError;
use std::collections::HashMap;

/// Validate a rule document:
/// - required non-empty version
/// - globally-unique ids across scenarios, conditions and actions
/// - non-empty event_types per scenario
/// - non-empty expression per condition
/// - non-empty type per action
/// - exactly one of condition/action per child slot
pub fn validate(doc: &RuleDocument) -> Result<(), ValidationError> {
    let mut errors = Vec::new();
    let mut ids: HashMap<String, String> = HashMap::new();

    if doc.version.is_empty() {
        errors.push("version is required".to_string());
    }

    for (index, scenario) in doc.scenarios.iter().enumerate() {
        if scenario.id.is_empty() {
            errors.push(format!("scenarios[{index}]: id is required"));
            continue;
        }
        let location = format!("scenario {}", scenario.id);
        record_id(&mut ids, &mut errors, &scenario.id, &location);
        if scenario.event_types.is_empty() {
            errors.push(format!("{location}: event_types must not be empty"));
        }
        validate_children(&scenario.children, &location, &mut ids, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

fn validate_children(
    refs: &[NodeRef],
    parent: &str,
    ids: &mut HashMap<String, String>,
    errors: &mut Vec<String>,
) {
    for (index, node_ref) in refs.iter().enumerate() {
        match (&node_ref.condition, &node_ref.action) {
            (Some(_), Some(_)) => {
                errors.push(format!(
                    "{parent}.children[{index}]: only one of condition/action may be set"
                ));
            }
            (None, None) => {
                errors.push(format!(
                    "{parent}.children[{index}]: one of condition/action must be set"
                ));
            }
            (Some(condition), None) => {
                if condition.id.is_empty() {
                    errors.push(format!(
                        "{parent}.children[{index}].condition: id is required"
                    ));
                    continue;
                }
                let location = format!("condition {}", condition.id);
                record_id(ids, errors, &condition.id, &location);
                if condition.expression.is_empty() {
                    errors.push(format!("{location}: expression is required"));
                }
                validate_children(&condition.children, &location, ids, errors);
            }
            (None, Some(action)) => {
                if action.id.is_empty() {
                    errors.push(format!("{parent}.children[{index}].action: id is required"));
                    continue;
                }
                let location = format!("action {}", action.id);
                record_id(ids, errors, &action.id, &location);
                if action.action_type.is_empty() {
                    errors.push(format!("{location}: type is required"));
                }
            }
        }
    }
}

fn record_id(
    ids: &mut HashMap<String, String>,
    errors: &mut Vec<String>,
    id: &str,
    location: &str,
) {
    if let Some(previous) = ids.get(id) {
        errors.push(format!(
            "duplicate id {id:?} (first seen at {previous}, again at {location})"
        ));
    } else {
        ids.insert(id.to_string(), location.to_string());
    }
}

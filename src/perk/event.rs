// SPDX-License-Identifier: MIT

//! Canonical input model for all incoming events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// An ingested domain event.
///
/// Constructed once at ingress and never mutated afterwards; the engine and
/// all evaluators hold it by shared reference. Payload values are dynamic
/// (`serde_json::Value`), so numbers, strings, booleans and nested mappings
/// all pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id; generated at ingress when the caller omits it.
    #[serde(default)]
    pub id: String,
    /// Primary dispatch key ("transaction", "login", ...).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Optional origin tag ("pos-system", "mobile-app", ...).
    #[serde(default)]
    pub source: String,
    /// The user or account the event is about.
    #[serde(default)]
    pub actor_id: String,
    /// When the event happened, per the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
    /// Server-assigned receive time; never serialized back to callers.
    #[serde(skip)]
    pub received_at: Option<DateTime<Utc>>,
    /// Arbitrary event data.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// Flat string metadata (tenant, region, ...).
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

impl Event {
    /// Create an event with a generated id and the current receive time.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            source: String::new(),
            actor_id: String::new(),
            occurred_at: None,
            received_at: Some(Utc::now()),
            payload: Map::new(),
            meta: HashMap::new(),
        }
    }

    /// Assign a generated id if the caller did not provide one.
    pub fn ensure_id(&mut self) {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
    }
}

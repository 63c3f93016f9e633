// SPDX-License-Identifier: MIT

//! Type-key to executor registry

use super::ActionExecutor;
use crate::perk::error::PerkError;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps action type keys to their executors.
///
/// Registration happens only at startup, before the engine accepts events;
/// afterwards the registry is read-only and shared behind an `Arc`, so
/// lookups need no synchronization.
#[derive(Default)]
pub struct ActionRegistry {
    executors: HashMap<String, Arc<dyn ActionExecutor>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an executor. Panics on a duplicate type key to surface
    /// misconfiguration immediately at startup.
    pub fn register(&mut self, executor: Arc<dyn ActionExecutor>) {
        let key = executor.type_key().to_string();
        if self.executors.contains_key(&key) {
            panic!("action registry: duplicate type {key:?}");
        }
        self.executors.insert(key, executor);
    }

    /// Look up the executor for a type key.
    pub fn get(&self, type_key: &str) -> Result<&Arc<dyn ActionExecutor>, PerkError> {
        self.executors
            .get(type_key)
            .ok_or_else(|| PerkError::UnknownActionType(type_key.to_string()))
    }

    /// All registered type keys.
    pub fn type_keys(&self) -> Vec<String> {
        self.executors.keys().cloned().collect()
    }
}

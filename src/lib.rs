// SPDX-License-Identifier: MIT

//! Event-driven rule engine for loyalty-programme workloads.
//!
//! Events are ingested over HTTP, evaluated against a YAML rule document
//! compiled into an immutable decision DAG, and matched rules trigger
//! side-effecting actions such as awarding loyalty points. The active DAG
//! can be hot-swapped at runtime without stopping the engine.

pub mod perk;

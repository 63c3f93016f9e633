// SPDX-License-Identifier: MIT

//! Concurrent evaluation engine
//!
//! Events flow through a bounded worker pool; each worker takes an atomic
//! snapshot of the current graph, runs the DFS, then executes matched
//! actions sequentially in document order. The graph pointer is an
//! [`ArcSwap`], so hot-reload is a single lock-free store and in-flight
//! workers simply finish on the snapshot they already hold.

mod pool;

use crate::perk::action::{ActionRegistry, ActionResult};
use crate::perk::config::EngineSettings;
use crate::perk::dag::{self, ActionMatch, EvalContext, Graph};
use crate::perk::error::ProcessError;
use crate::perk::event::Event;
use crate::perk::metrics;
use arc_swap::ArcSwap;
use opentelemetry::KeyValue;
use pool::WorkerPool;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Outcome of processing a single event.
#[derive(Debug, Clone, Serialize)]
pub struct EventResult {
    pub event_id: String,
    pub duration_ms: u64,
    pub scenarios_matched: Vec<String>,
    pub actions_executed: Vec<ActionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Engine-local monotonic counters.
///
/// The OTel instruments cover dashboards; these back the readiness logic
/// and tests, which need to read values back.
#[derive(Debug, Default)]
pub struct EngineStats {
    enqueued: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
}

impl EngineStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct EventJob {
    event: Event,
    result_tx: Option<oneshot::Sender<EventResult>>,
}

/// Reserved path for I/O-bound action parallelism; the current execution
/// model runs actions inline in the event worker to preserve ordering.
struct ActionJob {
    matched: ActionMatch,
    event: Arc<Event>,
    result_tx: Option<oneshot::Sender<ActionResult>>,
}

struct EngineCore {
    graph: ArcSwap<Graph>,
    registry: Arc<ActionRegistry>,
    settings: EngineSettings,
    stats: EngineStats,
    cancel: CancellationToken,
}

/// Processes events through the decision graph under a bounded worker pool.
pub struct Engine {
    core: Arc<EngineCore>,
    event_pool: WorkerPool<EventJob>,
    action_pool: WorkerPool<ActionJob>,
}

impl Engine {
    /// Create an engine and start its worker pools.
    pub fn new(graph: Graph, registry: Arc<ActionRegistry>, settings: EngineSettings) -> Self {
        let core = Arc::new(EngineCore {
            graph: ArcSwap::from_pointee(graph),
            registry,
            settings: settings.clone(),
            stats: EngineStats::default(),
            cancel: CancellationToken::new(),
        });

        let action_core = core.clone();
        let action_pool = WorkerPool::new(
            settings.action_workers,
            settings.action_workers * 10,
            move |job: ActionJob| {
                let core = action_core.clone();
                async move {
                    log::debug!(
                        "action worker executing {} for scenario {}",
                        job.matched.node.id(),
                        job.matched.scenario_id
                    );
                    let mut ctx = EvalContext::new(&job.event);
                    let result = core.run_action(&job.matched, &mut ctx).await;
                    if let Some(tx) = job.result_tx {
                        let _ = tx.send(result);
                    }
                }
            },
        );

        let event_core = core.clone();
        let event_pool = WorkerPool::new(
            settings.event_workers,
            settings.queue_depth,
            move |job: EventJob| {
                let core = event_core.clone();
                async move {
                    let result = core.process_event(job.event).await;
                    // Single-slot channel: this send never blocks, and a
                    // caller that already gave up just drops the result.
                    if let Some(tx) = job.result_tx {
                        let _ = tx.send(result);
                    }
                }
            },
        );

        Self {
            core,
            event_pool,
            action_pool,
        }
    }

    /// Process an event synchronously.
    ///
    /// Exactly one of four things happens: the result is returned, the
    /// queue is full, the per-event timeout elapses, or `cancel` fires.
    /// Timeout and cancellation abandon the wait only; the worker still
    /// finishes the event and its result is discarded.
    pub async fn process_sync(
        &self,
        event: Event,
        cancel: CancellationToken,
    ) -> Result<EventResult, ProcessError> {
        let (tx, rx) = oneshot::channel();
        let job = EventJob {
            event,
            result_tx: Some(tx),
        };
        if !self.event_pool.try_submit(job) {
            self.core.stats.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::events_dropped().add(1, &[]);
            return Err(ProcessError::QueueFull {
                capacity: self.core.settings.queue_depth,
            });
        }
        self.core.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        metrics::events_enqueued().add(1, &[]);

        let timeout_ms = self.core.settings.event_timeout_ms;
        tokio::select! {
            result = rx => match result {
                Ok(result) => Ok(result),
                Err(_) => Err(ProcessError::Cancelled),
            },
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                Err(ProcessError::Timeout { timeout_ms })
            }
            _ = cancel.cancelled() => Err(ProcessError::Cancelled),
        }
    }

    /// Enqueue an event for background processing. Returns false when the
    /// queue is full.
    pub fn process_async(&self, event: Event) -> bool {
        let job = EventJob {
            event,
            result_tx: None,
        };
        if !self.event_pool.try_submit(job) {
            self.core.stats.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::events_dropped().add(1, &[]);
            return false;
        }
        self.core.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        metrics::events_enqueued().add(1, &[]);
        true
    }

    /// Atomically replace the decision graph.
    ///
    /// Workers that already loaded the previous graph finish against it;
    /// new evaluations pick up the replacement. The old graph is freed when
    /// the last snapshot reference drops.
    pub fn swap_graph(&self, graph: Arc<Graph>) {
        self.core.graph.store(graph);
    }

    /// A snapshot of the current graph.
    pub fn graph(&self) -> Arc<Graph> {
        self.core.graph.load_full()
    }

    /// Queue used / capacity, in [0, 1].
    pub fn queue_utilization(&self) -> f64 {
        self.event_pool.utilization()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.core.stats
    }

    /// Drain both pools: pending events are processed before this returns.
    pub async fn shutdown(self) {
        self.event_pool.shutdown().await;
        self.action_pool.shutdown().await;
        self.core.cancel.cancel();
    }
}

impl EngineCore {
    async fn process_event(&self, event: Event) -> EventResult {
        let started = Instant::now();
        let graph = self.graph.load_full();

        let evaluation = dag::evaluate(&graph, &event);
        let mut ctx = evaluation.ctx;

        // Fail-open (the default) lets surviving branches trigger actions
        // despite earlier evaluation errors; fail-closed treats any
        // evaluation error as fatal for the whole event.
        let run_actions = self.settings.fail_open || ctx.errors.is_empty();

        let mut actions_executed = Vec::with_capacity(evaluation.matches.len());
        if run_actions {
            for matched in &evaluation.matches {
                actions_executed.push(self.run_action(matched, &mut ctx).await);
            }
        }

        let error = ctx.errors.first().cloned();
        drop(ctx);

        self.stats.processed.fetch_add(1, Ordering::Relaxed);
        metrics::events_processed().add(1, &[]);
        for scenario_id in &evaluation.scenarios_matched {
            metrics::scenarios_matched()
                .add(1, &[KeyValue::new("scenario_id", scenario_id.clone())]);
        }
        let duration = started.elapsed();
        metrics::event_duration_ms().record(duration.as_secs_f64() * 1000.0, &[]);

        EventResult {
            event_id: event.id.clone(),
            duration_ms: duration.as_millis() as u64,
            scenarios_matched: evaluation.scenarios_matched,
            actions_executed,
            error,
        }
    }

    async fn run_action(&self, matched: &ActionMatch, ctx: &mut EvalContext<'_>) -> ActionResult {
        let Some(action) = matched.node.as_action() else {
            return ActionResult {
                action_id: matched.node.id().to_string(),
                action_type: String::new(),
                success: false,
                message: format!("node {} is not an action", matched.node.id()),
            };
        };

        let executor = match self.registry.get(action.action_type()) {
            Ok(executor) => executor,
            Err(e) => {
                metrics::actions_executed().add(
                    1,
                    &[
                        KeyValue::new("action_type", action.action_type().to_string()),
                        KeyValue::new("status", "error"),
                    ],
                );
                return ActionResult {
                    action_id: action.id().to_string(),
                    action_type: action.action_type().to_string(),
                    success: false,
                    message: e.to_string(),
                };
            }
        };

        let result = match executor
            .execute(&self.cancel, action.id(), action.params(), ctx)
            .await
        {
            Ok(result) => result,
            Err(e) => ActionResult {
                action_id: action.id().to_string(),
                action_type: action.action_type().to_string(),
                success: false,
                message: e.to_string(),
            },
        };

        let status = if result.success { "success" } else { "error" };
        metrics::actions_executed().add(
            1,
            &[
                KeyValue::new("action_type", action.action_type().to_string()),
                KeyValue::new("status", status),
            ],
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perk::action::RewardPointsAction;
    use crate::perk::config::{validate, RuleDocument};
    use serde_json::json;

    const RULES: &str = r#"
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
                      type: reward_points
                      params:
                        operation: award
                        points_formula: "payload.amount * 0.05"
                        reason: High-value food purchase bonus
"#;

    fn engine_from(yaml: &str, settings: EngineSettings) -> Engine {
        let doc: RuleDocument = serde_yaml::from_str(yaml).unwrap();
        validate(&doc).unwrap();
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(RewardPointsAction::new()));
        let registry = Arc::new(registry);
        let graph = dag::build(&doc, &registry).unwrap();
        Engine::new(graph, registry, settings)
    }

    fn transaction_event(amount: f64) -> Event {
        let mut event = Event::new("transaction");
        event.source = "pos-system".to_string();
        event.actor_id = "user_42".to_string();
        event.payload = match json!({"amount": amount, "category": "food"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        event
    }

    #[tokio::test]
    async fn test_process_sync_matches_and_executes() {
        let engine = engine_from(RULES, EngineSettings::default());
        let result = engine
            .process_sync(transaction_event(1500.0), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.scenarios_matched, vec!["sc_food_high"]);
        assert_eq!(result.actions_executed.len(), 1);
        assert!(result.actions_executed[0].success);
        assert_eq!(
            result.actions_executed[0].message,
            "Awarded 75 points to user_42 — High-value food purchase bonus"
        );
        assert!(result.error.is_none());
        assert_eq!(engine.stats().processed(), 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_process_sync_prunes_below_threshold() {
        let engine = engine_from(RULES, EngineSettings::default());
        let result = engine
            .process_sync(transaction_event(500.0), CancellationToken::new())
            .await
            .unwrap();
        assert!(result.scenarios_matched.is_empty());
        assert!(result.actions_executed.is_empty());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_process_sync_surfaces_first_evaluation_error() {
        let engine = engine_from(RULES, EngineSettings::default());
        let mut event = transaction_event(1500.0);
        event.payload.remove("category");
        let result = engine
            .process_sync(event, CancellationToken::new())
            .await
            .unwrap();
        assert!(result.scenarios_matched.is_empty());
        let error = result.error.expect("missing-field error should surface");
        assert!(error.contains("cond_food"));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_process_sync_cancellation() {
        let engine = engine_from(RULES, EngineSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        // Cancellation races the (fast) worker; either a result or the
        // cancelled outcome is acceptable, nothing else.
        match engine
            .process_sync(transaction_event(1500.0), cancel)
            .await
        {
            Ok(_) | Err(ProcessError::Cancelled) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_process_async_accepts() {
        let engine = engine_from(RULES, EngineSettings::default());
        assert!(engine.process_async(transaction_event(1500.0)));
        assert_eq!(engine.stats().enqueued(), 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_swap_graph_changes_behavior() {
        let engine = engine_from(RULES, EngineSettings::default());

        let result = engine
            .process_sync(transaction_event(1500.0), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.scenarios_matched, vec!["sc_food_high"]);

        // Same document with the scenario disabled.
        let disabled = RULES.replace("enabled: true", "enabled: false");
        let doc: RuleDocument = serde_yaml::from_str(&disabled).unwrap();
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(RewardPointsAction::new()));
        let graph = dag::build(&doc, &registry).unwrap();
        engine.swap_graph(Arc::new(graph));

        let result = engine
            .process_sync(transaction_event(1500.0), CancellationToken::new())
            .await
            .unwrap();
        assert!(result.scenarios_matched.is_empty());
        assert!(result.actions_executed.is_empty());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_fail_closed_skips_actions_on_evaluation_error() {
        let settings = EngineSettings {
            fail_open: false,
            ..EngineSettings::default()
        };
        let rules = r#"
version: v1
scenarios:
  - id: sc
    enabled: true
    event_types: [transaction]
    children:
      - condition:
          id: cond_broken
          expression: payload.absent > 10
          children: []
      - action:
          id: act
          type: reward_points
          params: {operation: award, points: 1}
"#;
        let engine = engine_from(rules, settings);
        let result = engine
            .process_sync(transaction_event(1500.0), CancellationToken::new())
            .await
            .unwrap();
        assert!(result.actions_executed.is_empty());
        assert!(result.error.is_some());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_utilization_starts_empty() {
        let engine = engine_from(RULES, EngineSettings::default());
        assert_eq!(engine.queue_utilization(), 0.0);
        engine.shutdown().await;
    }
}

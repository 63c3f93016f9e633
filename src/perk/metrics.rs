//! Metric instrument factories for perk-rs.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"perk-rs"` meter; without a
//! provider installed they are no-ops, so recording is always safe.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};

/// Returns the shared meter for perk-rs instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("perk-rs")
}

/// Counter: events placed on the processing queue.
pub fn events_enqueued() -> Counter<u64> {
    meter()
        .u64_counter("perk.events.enqueued")
        .with_description("Number of events placed on the processing queue")
        .build()
}

/// Counter: events fully processed by the engine.
pub fn events_processed() -> Counter<u64> {
    meter()
        .u64_counter("perk.events.processed")
        .with_description("Number of events fully processed by the engine")
        .build()
}

/// Counter: events rejected because the queue was full.
pub fn events_dropped() -> Counter<u64> {
    meter()
        .u64_counter("perk.events.dropped")
        .with_description("Number of events rejected due to a full queue")
        .build()
}

/// Counter: scenario matches.
/// Labels: `scenario_id`.
pub fn scenarios_matched() -> Counter<u64> {
    meter()
        .u64_counter("perk.scenarios.matched")
        .with_description("Number of scenario matches")
        .build()
}

/// Counter: actions executed.
/// Labels: `action_type`, `status` ("success" | "error").
pub fn actions_executed() -> Counter<u64> {
    meter()
        .u64_counter("perk.actions.executed")
        .with_description("Number of actions executed")
        .build()
}

/// Counter: rule document reloads that failed and kept the previous graph.
pub fn reload_failures() -> Counter<u64> {
    meter()
        .u64_counter("perk.rules.reload_failures")
        .with_description("Number of failed rule document reloads")
        .build()
}

/// Histogram: end-to-end event processing latency in milliseconds.
pub fn event_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("perk.event.duration_ms")
        .with_description("End-to-end event processing latency in milliseconds")
        .with_unit("ms")
        .with_boundaries(vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0,
        ])
        .build()
}

/// Gauge: current event queue utilization (0-1).
pub fn queue_utilization() -> Gauge<f64> {
    meter()
        .f64_gauge("perk.queue.utilization")
        .with_description("Current event queue utilization ratio")
        .build()
}

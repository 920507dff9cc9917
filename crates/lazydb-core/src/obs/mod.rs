//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Core logic never touches metrics state directly; it records
//! `MetricsEvent`s through `sink::record`.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EntityCounters, EventOps, EventReport};
pub use sink::{
    MetricsEvent, MetricsSink, StatementKind, metrics_report, metrics_reset_all,
    with_metrics_sink,
};

//! Observability: runtime counters and the sink boundary that feeds them.
//!
//! Store, query and history code emit `MetricsEvent`s through `sink::record`
//! only; nothing outside this module touches the counter state.

pub mod metrics;
pub mod sink;

// re-exports
pub use metrics::{EventReport, KindSummary};
pub use sink::{
    MetricsEvent, MetricsSink, OpKind, metrics_report, metrics_reset_all, with_metrics_sink,
};

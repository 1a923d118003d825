//! Metrics sink boundary.
//!
//! Store and query code never touch `obs::metrics` directly.
//! All instrumentation flows through `MetricsEvent` and `MetricsSink`.
use crate::obs::metrics::{self, EventReport};
use std::{cell::RefCell, rc::Rc, time::Instant};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// OpKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpKind {
    Create,
    Read,
    Update,
    Delete,
    Query,
    History,
}

impl OpKind {
    const fn is_write(self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent<'a> {
    ExecStart {
        op: OpKind,
        kind: &'a str,
    },
    ExecFinish {
        op: OpKind,
        kind: &'a str,
        rows: u64,
        elapsed_us: u64,
        ok: bool,
    },
    RowsScanned {
        kind: &'a str,
        rows: u64,
    },
    UniqueViolation {
        kind: &'a str,
    },
    IndexDelta {
        kind: &'a str,
        inserts: u64,
        removes: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default sink writing into the thread-local counters.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::ExecStart { op, kind } => metrics::with_state_mut(|m| {
                let calls = match op {
                    OpKind::Create => &mut m.ops.create_calls,
                    OpKind::Read => &mut m.ops.read_calls,
                    OpKind::Update => &mut m.ops.update_calls,
                    OpKind::Delete => &mut m.ops.delete_calls,
                    OpKind::Query => &mut m.ops.query_calls,
                    OpKind::History => &mut m.ops.history_calls,
                };
                *calls = calls.saturating_add(1);

                let entry = m.kinds.entry(kind.to_string()).or_default();
                entry.calls = entry.calls.saturating_add(1);
            }),

            MetricsEvent::ExecFinish {
                op,
                kind,
                rows,
                elapsed_us,
                ok,
            } => metrics::with_state_mut(|m| {
                if op.is_write() {
                    m.ops.rows_written = m.ops.rows_written.saturating_add(rows);
                    metrics::add_duration(
                        &mut m.perf.write_us_total,
                        &mut m.perf.write_us_max,
                        elapsed_us,
                    );
                } else {
                    m.ops.rows_returned = m.ops.rows_returned.saturating_add(rows);
                    metrics::add_duration(
                        &mut m.perf.read_us_total,
                        &mut m.perf.read_us_max,
                        elapsed_us,
                    );
                }
                if !ok {
                    m.ops.errors = m.ops.errors.saturating_add(1);
                }

                let entry = m.kinds.entry(kind.to_string()).or_default();
                if op.is_write() {
                    entry.rows_written = entry.rows_written.saturating_add(rows);
                } else {
                    entry.rows_returned = entry.rows_returned.saturating_add(rows);
                }
                if !ok {
                    entry.errors = entry.errors.saturating_add(1);
                }
            }),

            MetricsEvent::RowsScanned { kind, rows } => metrics::with_state_mut(|m| {
                m.ops.rows_scanned = m.ops.rows_scanned.saturating_add(rows);
                let entry = m.kinds.entry(kind.to_string()).or_default();
                entry.rows_scanned = entry.rows_scanned.saturating_add(rows);
            }),

            MetricsEvent::UniqueViolation { kind } => metrics::with_state_mut(|m| {
                m.ops.unique_violations = m.ops.unique_violations.saturating_add(1);
                let entry = m.kinds.entry(kind.to_string()).or_default();
                entry.unique_violations = entry.unique_violations.saturating_add(1);
            }),

            MetricsEvent::IndexDelta {
                kind,
                inserts,
                removes,
            } => metrics::with_state_mut(|m| {
                m.ops.index_inserts = m.ops.index_inserts.saturating_add(inserts);
                m.ops.index_removes = m.ops.index_removes.saturating_add(removes);
                let entry = m.kinds.entry(kind.to_string()).or_default();
                entry.index_inserts = entry.index_inserts.saturating_add(inserts);
                entry.index_removes = entry.index_removes.saturating_add(removes);
            }),
        }
    }
}

pub(crate) fn record(event: MetricsEvent<'_>) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GlobalMetricsSink.record(event),
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset();
}

/// Run a closure with a temporary metrics sink override.
///
/// The previous sink is restored on every exit, unwinding included.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

/// Span
/// RAII guard that emits start/finish events for one operation.
/// Finish accounting happens on drop, so early returns count as failures
/// unless `succeed` was called.

pub(crate) struct Span<'a> {
    op: OpKind,
    kind: &'a str,
    started: Instant,
    rows: u64,
    ok: bool,
}

impl<'a> Span<'a> {
    #[must_use]
    pub(crate) fn new(op: OpKind, kind: &'a str) -> Self {
        record(MetricsEvent::ExecStart { op, kind });

        Self {
            op,
            kind,
            started: Instant::now(),
            rows: 0,
            ok: false,
        }
    }

    /// Mark the operation successful with `rows` touched.
    pub(crate) const fn succeed(&mut self, rows: u64) {
        self.rows = rows;
        self.ok = true;
    }
}

impl Drop for Span<'_> {
    fn drop(&mut self) {
        let elapsed_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);

        record(MetricsEvent::ExecFinish {
            op: self.op,
            kind: self.kind,
            rows: self.rows,
            elapsed_us,
            ok: self.ok,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        cell::Cell,
        panic::{AssertUnwindSafe, catch_unwind},
    };

    #[derive(Default)]
    struct CountingSink {
        calls: Cell<usize>,
    }

    impl MetricsSink for CountingSink {
        fn record(&self, _: MetricsEvent<'_>) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn unique(kind: &str) {
        record(MetricsEvent::UniqueViolation { kind });
    }

    #[test]
    fn with_metrics_sink_routes_and_restores_nested_overrides() {
        let outer = Rc::new(CountingSink::default());
        let inner = Rc::new(CountingSink::default());

        with_metrics_sink(outer.clone(), || {
            unique("t");
            with_metrics_sink(inner.clone(), || unique("t"));
            unique("t");
        });

        assert_eq!(outer.calls.get(), 2);
        assert_eq!(inner.calls.get(), 1);
        SINK_OVERRIDE.with(|cell| assert!(cell.borrow().is_none()));
    }

    #[test]
    fn with_metrics_sink_restores_override_on_panic() {
        let sink = Rc::new(CountingSink::default());

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            with_metrics_sink(sink.clone(), || {
                unique("t");
                panic!("intentional panic for guard test");
            });
        }))
        .is_err();

        assert!(panicked);
        assert_eq!(sink.calls.get(), 1);
        SINK_OVERRIDE.with(|cell| assert!(cell.borrow().is_none()));
    }

    #[test]
    fn span_counts_unfinished_operation_as_error() {
        metrics_reset_all();
        {
            let _span = Span::new(OpKind::Create, "marble");
        }
        {
            let mut span = Span::new(OpKind::Read, "marble");
            span.succeed(1);
        }

        let report = metrics_report();
        assert_eq!(report.counters.ops.create_calls, 1);
        assert_eq!(report.counters.ops.read_calls, 1);
        assert_eq!(report.counters.ops.rows_returned, 1);
        assert_eq!(report.counters.ops.errors, 1);
        assert_eq!(report.kinds[0].errors, 1);
    }

    #[test]
    fn index_delta_accumulates_per_kind() {
        metrics_reset_all();
        record(MetricsEvent::IndexDelta {
            kind: "marble",
            inserts: 2,
            removes: 1,
        });

        let report = metrics_report();
        assert_eq!(report.counters.ops.index_inserts, 2);
        assert_eq!(report.counters.kinds["marble"].index_removes, 1);
    }
}

use serde::Serialize;
use std::{
    cell::RefCell,
    collections::BTreeMap,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// EventState
/// Ephemeral, in-memory counters and timing totals for operations.
///

#[derive(Clone, Debug, Serialize)]
pub struct EventState {
    pub ops: EventOps,
    pub perf: EventPerf,
    pub kinds: BTreeMap<String, KindCounters>,
    pub since_ms: u64,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            ops: EventOps::default(),
            perf: EventPerf::default(),
            kinds: BTreeMap::new(),
            since_ms: now_millis(),
        }
    }
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventOps {
    // Operation entrypoints
    pub create_calls: u64,
    pub read_calls: u64,
    pub update_calls: u64,
    pub delete_calls: u64,
    pub query_calls: u64,
    pub history_calls: u64,

    // Rows touched
    pub rows_written: u64,
    pub rows_returned: u64,
    pub rows_scanned: u64,

    // Index maintenance
    pub index_inserts: u64,
    pub index_removes: u64,
    pub unique_violations: u64,

    // Failed operations
    pub errors: u64,
}

///
/// KindCounters
/// Per record-kind counters.
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct KindCounters {
    pub calls: u64,
    pub rows_written: u64,
    pub rows_returned: u64,
    pub rows_scanned: u64,
    pub index_inserts: u64,
    pub index_removes: u64,
    pub unique_violations: u64,
    pub errors: u64,
}

///
/// EventPerf
/// Wall-clock totals in microseconds.
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct EventPerf {
    pub write_us_total: u128,
    pub read_us_total: u128,
    pub write_us_max: u64,
    pub read_us_max: u64,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Reset all counters.
pub fn reset() {
    with_state_mut(|m| *m = EventState::default());
}

/// Accumulate a duration total and track a max.
pub(crate) fn add_duration(total: &mut u128, max: &mut u64, delta_us: u64) {
    *total = total.saturating_add(u128::from(delta_us));
    if delta_us > *max {
        *max = delta_us;
    }
}

///
/// EventReport
///

#[derive(Clone, Debug, Serialize)]
pub struct EventReport {
    /// Raw counters since `since_ms`.
    pub counters: EventState,
    /// Per-kind counters with averages.
    pub kinds: Vec<KindSummary>,
}

///
/// KindSummary
///

#[derive(Clone, Debug, Default, Serialize)]
pub struct KindSummary {
    pub kind: String,
    pub calls: u64,
    pub rows_written: u64,
    pub rows_returned: u64,
    pub rows_scanned: u64,
    pub avg_rows_scanned_per_call: f64,
    pub index_inserts: u64,
    pub index_removes: u64,
    pub unique_violations: u64,
    pub errors: u64,
}

/// Build a report from the in-memory counters.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn report() -> EventReport {
    let counters = with_state(Clone::clone);

    let mut kinds: Vec<KindSummary> = counters
        .kinds
        .iter()
        .map(|(kind, c)| KindSummary {
            kind: kind.clone(),
            calls: c.calls,
            rows_written: c.rows_written,
            rows_returned: c.rows_returned,
            rows_scanned: c.rows_scanned,
            avg_rows_scanned_per_call: if c.calls > 0 {
                c.rows_scanned as f64 / c.calls as f64
            } else {
                0.0
            },
            index_inserts: c.index_inserts,
            index_removes: c.index_removes,
            unique_violations: c.unique_violations,
            errors: c.errors,
        })
        .collect();

    // busiest kinds first
    kinds.sort_by(|a, b| b.calls.cmp(&a.calls).then_with(|| a.kind.cmp(&b.kind)));

    EventReport { counters, kinds }
}

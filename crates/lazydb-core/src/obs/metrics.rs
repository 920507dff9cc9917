use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
};

/// Number of echoed statements kept when `show_sql` is enabled.
pub(crate) const SQL_ECHO_CAPACITY: usize = 64;

///
/// EventState
/// Ephemeral, in-memory counters for lazy loading and validation.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub(crate) struct EventState {
    pub(crate) ops: EventOps,
    pub(crate) entities: BTreeMap<String, EntityCounters>,
    pub(crate) sql_echo: VecDeque<String>,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Statements
    pub selects: u64,
    pub attribute_selects: u64,
    pub inserts: u64,
    pub updates: u64,

    // Lazy loading
    pub lazy_fetches: u64,
    pub lazy_fetch_failures: u64,

    // Validation
    pub validation_passes: u64,
    pub attributes_checked: u64,
    pub attributes_skipped: u64,
    pub reachability_skips: u64,
}

///
/// EntityCounters
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EntityCounters {
    pub statements: u64,
    pub lazy_fetches: u64,
    pub lazy_fetch_failures: u64,
    pub validation_passes: u64,
    pub reachability_skips: u64,
}

///
/// EventReport
/// Point-in-time snapshot of the metrics state.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
    pub entities: BTreeMap<String, EntityCounters>,
    pub sql_echo: Vec<String>,
}

thread_local! {
    static EVENT_STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

/// Borrow metrics mutably.
pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Borrow metrics immutably.
pub(crate) fn with_state<R>(f: impl FnOnce(&EventState) -> R) -> R {
    EVENT_STATE.with(|m| f(&m.borrow()))
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    with_state_mut(|m| *m = EventState::default());
}

pub(crate) fn report() -> EventReport {
    with_state(|m| EventReport {
        ops: m.ops.clone(),
        entities: m.entities.clone(),
        sql_echo: m.sql_echo.iter().cloned().collect(),
    })
}

//! Metrics sink boundary.
//!
//! Core logic MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
//!
//! This module is the only allowed bridge between runtime logic and the
//! global metrics state.
use crate::obs::metrics::{self, SQL_ECHO_CAPACITY};
use derive_more::Display;
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// StatementKind
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum StatementKind {
    Select,
    SelectAttribute,
    Insert,
    Update,
}

///
/// MetricsEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    StatementExecuted {
        kind: StatementKind,
        entity_path: &'static str,
    },
    SqlEcho {
        sql: String,
    },
    LazyFetch {
        entity_path: &'static str,
        attribute: &'static str,
    },
    LazyFetchFailed {
        entity_path: &'static str,
        attribute: &'static str,
    },
    ReachabilitySkipped {
        entity_path: &'static str,
    },
    ValidationPass {
        entity_path: &'static str,
        checked: u64,
        skipped: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

/// GlobalMetricsSink
/// Default sink that writes into the thread-local metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        metrics::with_state_mut(|m| match event {
            MetricsEvent::StatementExecuted { kind, entity_path } => {
                let counter = match kind {
                    StatementKind::Select => &mut m.ops.selects,
                    StatementKind::SelectAttribute => &mut m.ops.attribute_selects,
                    StatementKind::Insert => &mut m.ops.inserts,
                    StatementKind::Update => &mut m.ops.updates,
                };
                *counter = counter.saturating_add(1);

                let entry = m.entities.entry(entity_path.to_string()).or_default();
                entry.statements = entry.statements.saturating_add(1);
            }

            MetricsEvent::SqlEcho { sql } => {
                if m.sql_echo.len() == SQL_ECHO_CAPACITY {
                    m.sql_echo.pop_front();
                }
                m.sql_echo.push_back(sql);
            }

            MetricsEvent::LazyFetch { entity_path, .. } => {
                m.ops.lazy_fetches = m.ops.lazy_fetches.saturating_add(1);
                let entry = m.entities.entry(entity_path.to_string()).or_default();
                entry.lazy_fetches = entry.lazy_fetches.saturating_add(1);
            }

            MetricsEvent::LazyFetchFailed { entity_path, .. } => {
                m.ops.lazy_fetch_failures = m.ops.lazy_fetch_failures.saturating_add(1);
                let entry = m.entities.entry(entity_path.to_string()).or_default();
                entry.lazy_fetch_failures = entry.lazy_fetch_failures.saturating_add(1);
            }

            MetricsEvent::ReachabilitySkipped { entity_path } => {
                m.ops.reachability_skips = m.ops.reachability_skips.saturating_add(1);
                let entry = m.entities.entry(entity_path.to_string()).or_default();
                entry.reachability_skips = entry.reachability_skips.saturating_add(1);
            }

            MetricsEvent::ValidationPass {
                entity_path,
                checked,
                skipped,
            } => {
                m.ops.validation_passes = m.ops.validation_passes.saturating_add(1);
                m.ops.attributes_checked = m.ops.attributes_checked.saturating_add(checked);
                m.ops.attributes_skipped = m.ops.attributes_skipped.saturating_add(skipped);
                let entry = m.entities.entry(entity_path.to_string()).or_default();
                entry.validation_passes = entry.validation_passes.saturating_add(1);
            }
        });
    }
}

pub(crate) fn record(event: MetricsEvent) {
    let override_sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());

    match override_sink {
        Some(sink) => sink.record(event),
        None => GlobalMetricsSink.record(event),
    }
}

/// Snapshot the current metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset all metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override.
/// The previous sink is restored on every exit, including unwind.
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

///
/// TESTS
///

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
        fn record(&self, _: MetricsEvent) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn skip_event() -> MetricsEvent {
        MetricsEvent::ReachabilitySkipped {
            entity_path: "obs::tests::Entity",
        }
    }

    #[test]
    fn with_metrics_sink_routes_and_restores_nested_overrides() {
        SINK_OVERRIDE.with(|cell| {
            *cell.borrow_mut() = None;
        });

        let outer = Rc::new(CountingSink::default());
        let inner = Rc::new(CountingSink::default());

        with_metrics_sink(outer.clone(), || {
            record(skip_event());
            assert_eq!(outer.calls.get(), 1);

            with_metrics_sink(inner.clone(), || {
                record(skip_event());
            });

            // inner override restored to outer
            record(skip_event());
        });

        assert_eq!(outer.calls.get(), 2);
        assert_eq!(inner.calls.get(), 1);
        SINK_OVERRIDE.with(|cell| {
            assert!(cell.borrow().is_none());
        });
    }

    #[test]
    fn with_metrics_sink_restores_override_on_panic() {
        SINK_OVERRIDE.with(|cell| {
            *cell.borrow_mut() = None;
        });

        let sink = Rc::new(CountingSink::default());
        let panicked = catch_unwind(AssertUnwindSafe(|| {
            with_metrics_sink(sink.clone(), || {
                record(skip_event());
                panic!("intentional panic for guard test");
            });
        }))
        .is_err();

        assert!(panicked);
        assert_eq!(sink.calls.get(), 1);
        SINK_OVERRIDE.with(|cell| {
            assert!(cell.borrow().is_none());
        });
    }

    #[test]
    fn global_sink_accumulates_counters() {
        metrics_reset_all();

        record(MetricsEvent::StatementExecuted {
            kind: StatementKind::Select,
            entity_path: "obs::tests::Entity",
        });
        record(MetricsEvent::LazyFetch {
            entity_path: "obs::tests::Entity",
            attribute: "tags",
        });
        record(MetricsEvent::ValidationPass {
            entity_path: "obs::tests::Entity",
            checked: 2,
            skipped: 1,
        });
        record(skip_event());

        let report = metrics_report();
        assert_eq!(report.ops.selects, 1);
        assert_eq!(report.ops.lazy_fetches, 1);
        assert_eq!(report.ops.attributes_checked, 2);
        assert_eq!(report.ops.attributes_skipped, 1);
        assert_eq!(report.ops.reachability_skips, 1);

        let entity = report
            .entities
            .get("obs::tests::Entity")
            .expect("entity counters should be present");
        assert_eq!(entity.statements, 1);
        assert_eq!(entity.validation_passes, 1);
    }

    #[test]
    fn sql_echo_is_bounded() {
        metrics_reset_all();

        for i in 0..(SQL_ECHO_CAPACITY + 5) {
            record(MetricsEvent::SqlEcho {
                sql: format!("select {i}"),
            });
        }

        let report = metrics_report();
        assert_eq!(report.sql_echo.len(), SQL_ECHO_CAPACITY);
        assert_eq!(report.sql_echo[0], "select 5");
    }
}

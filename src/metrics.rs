//! Operator self-observability: reconcile counters and duration histogram,
//! exposed over the `rest-api` router's `/metrics` endpoint.
//!
//! This is the operator's own health signal, not per-tenant metrics for the
//! managed Supabase instances — those are out of scope here.

use std::sync::Arc;

use prometheus_client::encoding::{text::encode, EncodeLabelSet};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::{Registry, Unit};
use tokio::time::Instant;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PhaseLabel {
    pub phase: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabel {
    pub kind: String,
}

#[derive(Clone)]
pub struct Metrics {
    pub reconcile_runs: Counter,
    pub reconcile_failures: Family<ErrorLabel, Counter>,
    pub reconcile_duration: Histogram,
    pub phase_transitions: Family<PhaseLabel, Counter>,
    registry: Arc<Registry>,
}

impl Default for Metrics {
    fn default() -> Self {
        let mut registry = Registry::with_prefix("supacontrol");

        let reconcile_runs = Counter::default();
        registry.register("reconcile_runs", "total reconcile invocations", reconcile_runs.clone());

        let reconcile_failures = Family::<ErrorLabel, Counter>::default();
        registry.register(
            "reconcile_failures",
            "reconcile invocations that returned an error",
            reconcile_failures.clone(),
        );

        let reconcile_duration = Histogram::new([0.05, 0.1, 0.5, 1., 5., 15., 30., 60.].into_iter());
        registry.register_with_unit(
            "reconcile_duration",
            "time spent in a single reconcile call",
            Unit::Seconds,
            reconcile_duration.clone(),
        );

        let phase_transitions = Family::<PhaseLabel, Counter>::default();
        registry.register(
            "phase_transitions",
            "instance phase transitions observed by the reconciler",
            phase_transitions.clone(),
        );

        Self {
            reconcile_runs,
            reconcile_failures,
            reconcile_duration,
            phase_transitions,
            registry: Arc::new(registry),
        }
    }
}

impl Metrics {
    /// Render the registry in Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }

    pub fn record_failure(&self, kind: &str) {
        self.reconcile_failures
            .get_or_create(&ErrorLabel { kind: kind.to_string() })
            .inc();
    }

    pub fn record_phase_transition(&self, phase: &str) {
        self.phase_transitions
            .get_or_create(&PhaseLabel { phase: phase.to_string() })
            .inc();
    }

    /// Starts a measurement that records elapsed time into
    /// `reconcile_duration` and increments `reconcile_runs` when dropped.
    pub fn start_reconcile(&self) -> ReconcileTimer {
        self.reconcile_runs.inc();
        ReconcileTimer {
            start: Instant::now(),
            histogram: self.reconcile_duration.clone(),
        }
    }
}

pub struct ReconcileTimer {
    start: Instant,
    histogram: Histogram,
}

impl Drop for ReconcileTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_prometheus_text_format() {
        let metrics = Metrics::default();
        metrics.record_phase_transition("Running");
        let rendered = metrics.encode().unwrap();
        assert!(rendered.contains("supacontrol_phase_transitions"));
    }

    #[test]
    fn start_reconcile_increments_run_counter() {
        let metrics = Metrics::default();
        {
            let _timer = metrics.start_reconcile();
        }
        let rendered = metrics.encode().unwrap();
        assert!(rendered.contains("supacontrol_reconcile_runs_total 1"));
    }
}

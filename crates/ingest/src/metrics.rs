//! Metrics hook for ingester calls.
//!
//! No recorder is installed by default. Install one with
//! [`set_ingest_metrics`] to observe latency and outcome of every call.
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use crate::error::IngestError;

/// Counts describing one successful call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub documents: usize,
    pub updated: usize,
    pub inserted: usize,
}

/// Metrics observer for ingester calls.
pub trait IngestMetrics: Send + Sync {
    fn record_ingest(
        &self,
        ingester: &str,
        latency: Duration,
        result: Result<IngestStats, &IngestError>,
    );

    /// An identity lookup hit a value its own identity mapping rejected.
    fn record_lookup_failure(&self, _identity_key: &str) {}
}

/// Install or clear the global ingest metrics recorder.
pub fn set_ingest_metrics(recorder: Option<Arc<dyn IngestMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn IngestMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn IngestMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn IngestMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

pub(crate) fn record_lookup_failure(identity_key: &str) {
    if let Some(recorder) = metrics_recorder() {
        recorder.record_lookup_failure(identity_key);
    }
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn IngestMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    pub(crate) fn record(self, ingester: &str, result: Result<IngestStats, &IngestError>) {
        self.recorder
            .record_ingest(ingester, self.start.elapsed(), result);
    }
}

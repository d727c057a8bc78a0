//! Engine API call metrics.

use metrics::{Counter, Histogram};
use std::{fmt, sync::OnceLock, time::Duration};

/// Duration of each Engine API call, labelled by `method`.
pub const METRIC_REQUEST_DURATION: &str = "engine_api_request_duration_seconds";

/// Engine API calls that hit their deadline, labelled by `method`.
pub const METRIC_TIMEOUTS: &str = "engine_api_timeouts_total";

static METRIC_DESCRIPTORS: OnceLock<()> = OnceLock::new();

/// Bridge operations, used as metric labels and in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOperation {
    /// Payload submission.
    NewPayload,
    /// Fork-choice notification.
    ForkchoiceUpdated,
    /// Built payload retrieval.
    GetPayload,
    /// Capability negotiation.
    ExchangeCapabilities,
}

impl EngineOperation {
    /// All operations.
    pub const ALL: [Self; 4] =
        [Self::NewPayload, Self::ForkchoiceUpdated, Self::GetPayload, Self::ExchangeCapabilities];

    /// Metric label value.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewPayload => "new_payload",
            Self::ForkchoiceUpdated => "forkchoice_updated",
            Self::GetPayload => "get_payload",
            Self::ExchangeCapabilities => "exchange_capabilities",
        }
    }
}

impl fmt::Display for EngineOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
struct OperationMetrics {
    duration: Histogram,
    timeouts: Counter,
}

impl OperationMetrics {
    fn new(operation: EngineOperation) -> Self {
        Self {
            duration: metrics::histogram!(METRIC_REQUEST_DURATION, "method" => operation.as_str()),
            timeouts: metrics::counter!(METRIC_TIMEOUTS, "method" => operation.as_str()),
        }
    }
}

/// Per-operation duration histograms and timeout counters.
///
/// Handles are registered against the recorder installed when
/// [`EngineMetrics::new`] runs.
#[derive(Clone)]
pub struct EngineMetrics {
    new_payload: OperationMetrics,
    forkchoice_updated: OperationMetrics,
    get_payload: OperationMetrics,
    exchange_capabilities: OperationMetrics,
}

impl EngineMetrics {
    /// Register the bridge metrics.
    pub fn new() -> Self {
        init_metric_descriptors();
        Self {
            new_payload: OperationMetrics::new(EngineOperation::NewPayload),
            forkchoice_updated: OperationMetrics::new(EngineOperation::ForkchoiceUpdated),
            get_payload: OperationMetrics::new(EngineOperation::GetPayload),
            exchange_capabilities: OperationMetrics::new(EngineOperation::ExchangeCapabilities),
        }
    }

    fn operation(&self, operation: EngineOperation) -> &OperationMetrics {
        match operation {
            EngineOperation::NewPayload => &self.new_payload,
            EngineOperation::ForkchoiceUpdated => &self.forkchoice_updated,
            EngineOperation::GetPayload => &self.get_payload,
            EngineOperation::ExchangeCapabilities => &self.exchange_capabilities,
        }
    }

    /// Record the duration of a completed call, successful or not.
    pub fn record_duration(&self, operation: EngineOperation, elapsed: Duration) {
        self.operation(operation).duration.record(elapsed.as_secs_f64());
    }

    /// Count a deadline breach.
    pub fn increment_timeout(&self, operation: EngineOperation) {
        self.operation(operation).timeouts.increment(1);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineMetrics").finish_non_exhaustive()
    }
}

fn init_metric_descriptors() {
    METRIC_DESCRIPTORS.get_or_init(|| {
        metrics::describe_histogram!(
            METRIC_REQUEST_DURATION,
            metrics::Unit::Seconds,
            "Duration of Engine API calls to the execution client"
        );
        metrics::describe_counter!(
            METRIC_TIMEOUTS,
            "Engine API calls to the execution client that exceeded their deadline"
        );
    });
}

/// Collects one snapshot of `snapshotter`, keyed by metric name and `method` label.
///
/// A snapshot drains histogram samples, so take exactly one per assertion block.
#[cfg(test)]
pub(crate) fn recorded_by_method(
    snapshotter: &metrics_util::debugging::Snapshotter,
) -> std::collections::HashMap<(String, String), metrics_util::debugging::DebugValue> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| {
            let key = key.key();
            let method = key.labels().find(|label| label.key() == "method")?.value().to_owned();
            Some(((key.name().to_owned(), method), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_operation_labels() {
        let labels: Vec<_> = EngineOperation::ALL.iter().map(EngineOperation::as_str).collect();
        assert_eq!(
            labels,
            ["new_payload", "forkchoice_updated", "get_payload", "exchange_capabilities"]
        );
    }

    #[test]
    fn test_records_per_operation() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let metrics = metrics::with_local_recorder(&recorder, EngineMetrics::new);

        metrics.increment_timeout(EngineOperation::GetPayload);
        metrics.record_duration(EngineOperation::GetPayload, Duration::from_millis(250));

        let recorded = recorded_by_method(&snapshotter);
        let value_of =
            |name: &str, method: &str| recorded.get(&(name.to_owned(), method.to_owned()));

        assert_eq!(value_of(METRIC_TIMEOUTS, "get_payload"), Some(&DebugValue::Counter(1)));
        assert_eq!(value_of(METRIC_TIMEOUTS, "new_payload"), Some(&DebugValue::Counter(0)));
        match value_of(METRIC_REQUEST_DURATION, "get_payload") {
            Some(DebugValue::Histogram(samples)) => {
                assert_eq!(samples.len(), 1);
                assert_eq!(samples[0].into_inner(), 0.25);
            }
            other => panic!("expected histogram, got {other:?}"),
        }
    }
}

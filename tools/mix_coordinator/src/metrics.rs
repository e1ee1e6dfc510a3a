use std::time::Duration;

use tracing::info;

use crate::state::MixStatus;

pub trait SessionMetrics: Send + Sync {
    fn record_transition(&self, session_id: &str, from: MixStatus, to: MixStatus);
    fn record_latency(&self, stage: &'static str, elapsed: Duration);
}

#[derive(Default, Debug, Clone)]
pub struct NoopMetrics;

impl SessionMetrics for NoopMetrics {
    fn record_transition(&self, _session_id: &str, _from: MixStatus, _to: MixStatus) {}
    fn record_latency(&self, _stage: &'static str, _elapsed: Duration) {}
}

/// Emits transitions and stage latencies through the tracing pipeline.
#[derive(Default, Debug, Clone)]
pub struct LogMetrics;

impl SessionMetrics for LogMetrics {
    fn record_transition(&self, session_id: &str, from: MixStatus, to: MixStatus) {
        info!(session_id, from = %from, to = %to, "session transition");
    }

    fn record_latency(&self, stage: &'static str, elapsed: Duration) {
        info!(stage, elapsed_ms = elapsed.as_millis() as u64, "stage latency");
    }
}

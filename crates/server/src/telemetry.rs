//! Prometheus export of pipeline stage and reply metrics.

use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use ragchat::{PipelineMetrics, ReplyOutcome, Stage};

pub const STAGE_LATENCY: &str = "ragchat_stage_latency_seconds";
pub const STAGE_FAILURES: &str = "ragchat_stage_failures_total";
pub const REPLIES: &str = "ragchat_replies_total";
pub const REPLY_LATENCY: &str = "ragchat_reply_latency_seconds";

/// Forwards pipeline events to whatever `metrics` recorder is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl PipelineMetrics for PrometheusMetrics {
    fn record_stage(&self, stage: Stage, latency: Duration, ok: bool) {
        histogram!(STAGE_LATENCY, "stage" => stage.as_str()).record(latency.as_secs_f64());
        if !ok {
            counter!(STAGE_FAILURES, "stage" => stage.as_str()).increment(1);
        }
    }

    fn record_reply(&self, outcome: &ReplyOutcome, latency: Duration) {
        let reason = match outcome {
            ReplyOutcome::Degraded(err) => err.kind(),
            _ => "none",
        };
        counter!(REPLIES, "outcome" => outcome.label(), "reason" => reason).increment(1);
        histogram!(REPLY_LATENCY).record(latency.as_secs_f64());
    }
}

/// Install the process-wide Prometheus recorder. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

//! Metrics instrumentation for orchestration observability.

use std::time::Instant;

pub const MODEL_CALL_LATENCY: &str = "model_call_latency";
pub const TOOL_EXECUTION_LATENCY: &str = "tool_execution_latency";
pub const TURN_LOOP_DURATION: &str = "turn_loop_duration";

/// Record model provider latency.
pub fn record_model_latency(duration_ms: f64) {
    metrics::histogram!(MODEL_CALL_LATENCY, duration_ms);
}

/// Record tool execution latency.
pub fn record_tool_latency(duration_ms: f64) {
    metrics::histogram!(TOOL_EXECUTION_LATENCY, duration_ms);
}

/// Record the wall-clock time of one `run_turn_loop` invocation.
pub fn record_turn_loop_duration(duration_ms: f64) {
    metrics::histogram!(TURN_LOOP_DURATION, duration_ms);
}

pub fn increment_handoff_count() {
    metrics::counter!("handoff_count", 1);
}

pub fn increment_guardrail_rejection_count() {
    metrics::counter!("guardrail_rejection_count", 1);
}

pub fn increment_turn_budget_exceeded_count() {
    metrics::counter!("turn_budget_exceeded_count", 1);
}

pub fn increment_history_truncation_count() {
    metrics::counter!("history_truncation_count", 1);
}

/// Install a Prometheus recorder listening on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus_exporter(
    addr: std::net::SocketAddr,
) -> Result<(), crate::interfaces::RuntimeError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| {
            crate::interfaces::RuntimeError::ConfigError(format!(
                "Failed to install metrics exporter: {}",
                e
            ))
        })
}

/// RAII timer for automatic metric recording.
pub struct MetricTimer {
    start: Instant,
    metric_name: &'static str,
}

impl MetricTimer {
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for MetricTimer {
    fn drop(&mut self) {
        let duration_ms = self.elapsed_ms();
        match self.metric_name {
            MODEL_CALL_LATENCY => record_model_latency(duration_ms),
            TOOL_EXECUTION_LATENCY => record_tool_latency(duration_ms),
            TURN_LOOP_DURATION => record_turn_loop_duration(duration_ms),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_without_recorder_is_noop() {
        let timer = MetricTimer::new(TURN_LOOP_DURATION);
        assert!(timer.elapsed_ms() >= 0.0);
        drop(timer);
        increment_handoff_count();
    }
}

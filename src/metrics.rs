//! Prometheus metrics for the batch pipeline

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,

    pub batches_submitted_total: IntCounter,
    pub batches_completed_total: IntCounter,
    pub batches_timed_out_total: IntCounter,
    pub batches_aborted_total: IntCounter,
    pub batches_in_flight: IntGauge,

    pub outcomes_received_total: IntCounter,
    pub outcomes_failed_total: IntCounter,
    pub duplicate_outcomes_total: IntCounter,
    pub stale_outcomes_total: IntCounter,
    pub task_duration_seconds: Histogram,

    pub notifications_published_total: IntCounter,
    pub notifications_suppressed_total: IntCounter,
    pub publication_failures_total: IntCounter,

    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn histogram(
    registry: &Registry,
    name: &str,
    help: &str,
    buckets: Vec<f64>,
) -> prometheus::Result<Histogram> {
    let histogram = Histogram::with_opts(HistogramOpts::new(name, help).buckets(buckets))?;
    registry.register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

impl Metrics {
    /// Create a metrics set on its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("stockscan".to_string()), None)?;

        Ok(Self {
            batches_submitted_total: counter(
                &registry,
                "batches_submitted_total",
                "Batches accepted by the dispatcher",
            )?,
            batches_completed_total: counter(
                &registry,
                "batches_completed_total",
                "Batches that received every expected outcome",
            )?,
            batches_timed_out_total: counter(
                &registry,
                "batches_timed_out_total",
                "Batches published as partial after the watchdog deadline",
            )?,
            batches_aborted_total: counter(
                &registry,
                "batches_aborted_total",
                "Batches aborted before completion",
            )?,
            batches_in_flight: gauge(
                &registry,
                "batches_in_flight",
                "Registered batches still waiting for outcomes",
            )?,
            outcomes_received_total: counter(
                &registry,
                "outcomes_received_total",
                "Task outcomes accepted by the aggregator",
            )?,
            outcomes_failed_total: counter(
                &registry,
                "outcomes_failed_total",
                "Task outcomes with FAILED status",
            )?,
            duplicate_outcomes_total: counter(
                &registry,
                "duplicate_outcomes_total",
                "Task outcomes dropped as duplicates",
            )?,
            stale_outcomes_total: counter(
                &registry,
                "stale_outcomes_total",
                "Task outcomes dropped for unknown or expired batches",
            )?,
            task_duration_seconds: histogram(
                &registry,
                "task_duration_seconds",
                "Strategy execution time per task unit",
                vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            )?,
            notifications_published_total: counter(
                &registry,
                "notifications_published_total",
                "Batch completion events broadcast",
            )?,
            notifications_suppressed_total: counter(
                &registry,
                "notifications_suppressed_total",
                "Duplicate publication attempts suppressed by the claim guard",
            )?,
            publication_failures_total: counter(
                &registry,
                "publication_failures_total",
                "Publication attempts that exhausted their retries",
            )?,
            http_requests_total: counter(&registry, "http_requests_total", "HTTP requests served")?,
            http_requests_in_flight: gauge(
                &registry,
                "http_requests_in_flight",
                "HTTP requests currently being served",
            )?,
            http_request_duration_seconds: histogram(
                &registry,
                "http_request_duration_seconds",
                "HTTP request latency",
                prometheus::DEFAULT_BUCKETS.to_vec(),
            )?,
            registry,
        })
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn export(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

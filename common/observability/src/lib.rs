use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry};

/// Process-wide Prometheus metrics for the control plane service.
///
/// Mirrors the per-service `*Metrics` structs used elsewhere in this
/// codebase: one [`Registry`], one struct field per collector, registered
/// eagerly in [`ControlPlaneMetrics::new`] so a misregistration (duplicate
/// name, bad bucket) fails fast at startup rather than silently dropping
/// samples.
#[derive(Clone)]
pub struct ControlPlaneMetrics {
    pub registry: Registry,
    pub http_errors_total: IntCounterVec,
    pub rate_limited_total: IntCounterVec,
    pub incident_transitions_total: IntCounterVec,
    pub flag_evaluations_total: IntCounterVec,
    pub job_runs_total: IntCounterVec,
    pub job_duration_seconds: Histogram,
    pub realtime_streams_open: IntGaugeVec,
}

impl ControlPlaneMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_errors_total = IntCounterVec::new(
            Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)",
            ),
            &["service", "code", "status"],
        )
        .unwrap();

        let rate_limited_total = IntCounterVec::new(
            Opts::new(
                "rate_limited_total",
                "Requests rejected by the fixed-window rate limiter",
            ),
            &["tenant_id", "route"],
        )
        .unwrap();

        let incident_transitions_total = IntCounterVec::new(
            Opts::new(
                "incident_transitions_total",
                "Incident status transitions applied",
            ),
            &["from_status", "to_status"],
        )
        .unwrap();

        let flag_evaluations_total = IntCounterVec::new(
            Opts::new(
                "flag_evaluations_total",
                "Feature flag evaluations performed, by outcome",
            ),
            &["flag_key", "enabled"],
        )
        .unwrap();

        let job_runs_total = IntCounterVec::new(
            Opts::new("job_runs_total", "Durable job worker executions"),
            &["job_type", "outcome"],
        )
        .unwrap();

        let job_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "job_duration_seconds",
                "Time spent executing a single durable job",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )
        .unwrap();

        let realtime_streams_open = IntGaugeVec::new(
            Opts::new(
                "realtime_streams_open",
                "Currently open incident change-stream connections",
            ),
            &["tenant_id"],
        )
        .unwrap();

        let _ = registry.register(Box::new(http_errors_total.clone()));
        let _ = registry.register(Box::new(rate_limited_total.clone()));
        let _ = registry.register(Box::new(incident_transitions_total.clone()));
        let _ = registry.register(Box::new(flag_evaluations_total.clone()));
        let _ = registry.register(Box::new(job_runs_total.clone()));
        let _ = registry.register(Box::new(job_duration_seconds.clone()));
        let _ = registry.register(Box::new(realtime_streams_open.clone()));

        ControlPlaneMetrics {
            registry,
            http_errors_total,
            rate_limited_total,
            incident_transitions_total,
            flag_evaluations_total,
            job_runs_total,
            job_duration_seconds,
            realtime_streams_open,
        }
    }
}

impl Default for ControlPlaneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

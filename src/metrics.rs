use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::time::Instant;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref CHART_REQUESTS: IntCounter = IntCounter::new(
        "chart_requests_total",
        "Total number of chart data requests served"
    ).unwrap();

    pub static ref CHART_REQUEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "chart_request_duration_seconds",
            "Chart request duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0])
    ).unwrap();

    pub static ref SOURCE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "usage_source_failures_total",
            "Per-source usage fetches that failed and were dropped from the chart"
        ),
        &["source"]
    ).unwrap();

    pub static ref STATS_CACHE_HITS: IntCounter = IntCounter::new(
        "stats_cache_hits_total",
        "Lookups answered from the version/permission caches"
    ).unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(CHART_REQUESTS.clone())).unwrap();
    REGISTRY.register(Box::new(CHART_REQUEST_DURATION.clone())).unwrap();
    REGISTRY.register(Box::new(SOURCE_FAILURES.clone())).unwrap();
    REGISTRY.register(Box::new(STATS_CACHE_HITS.clone())).unwrap();
}

pub fn record_source_failure(source: &str) {
    SOURCE_FAILURES.with_label_values(&[source]).inc();
}

pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn new() -> Self {
        CHART_REQUESTS.inc();
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for RequestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        CHART_REQUEST_DURATION.observe(duration);
    }
}

use arr_engine::LineageFault;
use once_cell::sync::Lazy;
use prometheus::{
    opts, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder,
};

macro_rules! counter_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| IntCounterVec::new(opts!($name, $help), $labels).unwrap())
    };
}
macro_rules! histogram_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| {
            HistogramVec::new(
                HistogramOpts::new($name, $help).buckets(LATENCY_BUCKETS.to_vec()),
                $labels,
            )
            .unwrap()
        })
    };
}
macro_rules! counter {
    ($name:expr, $help:expr) => {
        Lazy::new(|| IntCounter::new($name, $help).unwrap())
    };
}

const LATENCY_BUCKETS: [f64; 12] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

// ── HTTP ────────────────────────────────────────────────────────────────────
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> =
    counter_vec!("http_requests_total", "Total HTTP requests", &["method", "path", "status"]);
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> =
    histogram_vec!("http_request_duration_seconds", "HTTP request latency", &["method", "path"]);

// ── Breakdown ───────────────────────────────────────────────────────────────
pub static BREAKDOWN_REQUESTS: Lazy<IntCounterVec> = counter_vec!(
    "breakdown_requests_total",
    "ARR breakdown computations by outcome",
    &["outcome"]
);
pub static BREAKDOWN_DURATION: Lazy<HistogramVec> = histogram_vec!(
    "breakdown_duration_seconds",
    "Time to load a snapshot and compute its breakdown",
    &["outcome"]
);
pub static LINEAGE_FAULTS: Lazy<IntCounterVec> = counter_vec!(
    "lineage_faults_total",
    "Lineages excluded from reports as malformed",
    &["kind"]
);

// ── Snapshot cache ──────────────────────────────────────────────────────────
pub static SNAPSHOT_CACHE_HITS: Lazy<IntCounter> =
    counter!("snapshot_cache_hits_total", "Snapshot cache hits");
pub static SNAPSHOT_CACHE_MISSES: Lazy<IntCounter> =
    counter!("snapshot_cache_misses_total", "Snapshot cache misses");

pub fn register_all(r: &Registry) -> prometheus::Result<()> {
    r.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    r.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    r.register(Box::new(BREAKDOWN_REQUESTS.clone()))?;
    r.register(Box::new(BREAKDOWN_DURATION.clone()))?;
    r.register(Box::new(LINEAGE_FAULTS.clone()))?;
    r.register(Box::new(SNAPSHOT_CACHE_HITS.clone()))?;
    r.register(Box::new(SNAPSHOT_CACHE_MISSES.clone()))?;
    Ok(())
}

pub fn gather_metrics(r: &Registry) -> prometheus::Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&r.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|err| prometheus::Error::Msg(err.to_string()))
}

pub fn observe_http(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn observe_breakdown(outcome: &str, duration_secs: f64) {
    BREAKDOWN_REQUESTS.with_label_values(&[outcome]).inc();
    BREAKDOWN_DURATION
        .with_label_values(&[outcome])
        .observe(duration_secs);
}

pub fn record_faults(faults: &[LineageFault]) {
    for fault in faults {
        LINEAGE_FAULTS.with_label_values(&[fault.kind.as_str()]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arr_engine::FaultKind;
    use uuid::Uuid;

    #[test]
    fn registry_exposes_every_family() {
        let registry = Registry::new_custom(Some("test".into()), None).unwrap();
        register_all(&registry).unwrap();

        observe_http("GET", "/health", 200, 0.002);
        observe_breakdown("ok", 0.01);
        record_faults(&[LineageFault {
            kind: FaultKind::Cycle,
            contract_id: Uuid::nil(),
            service_line_item_id: Uuid::nil(),
        }]);
        SNAPSHOT_CACHE_HITS.inc();
        SNAPSHOT_CACHE_MISSES.inc();

        let text = gather_metrics(&registry).unwrap();
        for name in [
            "test_http_requests_total",
            "test_breakdown_requests_total",
            "test_breakdown_duration_seconds",
            "test_lineage_faults_total",
            "test_snapshot_cache_hits_total",
            "test_snapshot_cache_misses_total",
        ] {
            assert!(text.contains(name), "{} missing from exposition", name);
        }
        assert!(text.contains("kind=\"cycle\""));
    }
}

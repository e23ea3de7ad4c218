use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter,
    register_int_counter_vec, CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // Persistence Metrics (MongoDB)
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of database operations",
        &["operation", "collection", "status"]
    )
    .unwrap();

    pub static ref DB_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "db_operation_duration_seconds",
        "Database operation duration in seconds",
        &["operation", "collection"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // Search cache Metrics (Redis)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();

    // Augmentation Metrics
    pub static ref SEARCH_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "search_requests_total",
        "Search collaborator calls by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref SEARCH_AUGMENTATIONS_EXHAUSTED_TOTAL: IntCounter = register_int_counter!(
        "search_augmentations_exhausted_total",
        "Topics whose augmentation gave up after all retries"
    )
    .unwrap();

    // Generation Metrics
    pub static ref GENERATION_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "generation_requests_total",
        "Generation requests by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref QUESTIONS_GENERATED_TOTAL: IntCounter = register_int_counter!(
        "questions_generated_total",
        "Questions that passed extraction and validation"
    )
    .unwrap();

    pub static ref QUESTIONS_REJECTED_TOTAL: IntCounter = register_int_counter!(
        "questions_rejected_total",
        "Parsed items dropped by validation"
    )
    .unwrap();

    // Feedback Metrics
    pub static ref FEEDBACK_ATTEMPTS_RECORDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "feedback_attempts_recorded_total",
        "Attempts folded into topic statistics",
        &["correct"]
    )
    .unwrap();

    pub static ref AGGREGATE_UPDATE_CONFLICTS_TOTAL: IntCounter = register_int_counter!(
        "aggregate_update_conflicts_total",
        "Optimistic-concurrency conflicts on user aggregates"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track database operation with metrics
pub async fn track_db_operation<F, T>(
    operation: &str,
    collection: &str,
    future: F,
) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, collection, status])
        .inc();

    DB_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, collection])
        .observe(duration);

    result
}

pub fn record_cache_operation(operation: &str, ok: bool) {
    let status = if ok { "success" } else { "error" };
    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// Record cache hit
pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

/// Record cache miss
pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}

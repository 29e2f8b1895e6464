//! Prometheus metrics for invoices-service.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, HistogramVec, TextEncoder, register_counter_vec, register_histogram_vec,
};

/// Database query duration histogram by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoices_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Invoice creation counter; kind is `standard` or `credit_note`.
pub static INVOICES_CREATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoices_created_total",
        "Total number of invoices created by kind",
        &["kind"]
    )
    .expect("Failed to register invoices_created_total")
});

/// Rows moved in and out of the archive.
pub static ARCHIVE_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoices_archive_transitions_total",
        "Soft-delete transitions by entity and direction",
        &["entity", "direction"] // person/invoice, archived/restored
    )
    .expect("Failed to register archive_transitions_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICES_CREATED_TOTAL);
    Lazy::force(&ARCHIVE_TRANSITIONS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

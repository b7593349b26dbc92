//! Prometheus metrics for the edit and locking paths (§4.J).

use chunkedgraph_o11y::metrics::{
    try_create_histogram_vec, try_create_int_counter_vec, HistogramVec, IntCounterVec,
};
use once_cell::sync::Lazy;

pub static OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    try_create_int_counter_vec(
        "chunkedgraph_operations_total",
        "Edit operations completed, by kind and outcome",
        &["kind", "outcome"],
    )
    .expect("metric registration")
});

pub static LOCK_FAILED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    try_create_int_counter_vec(
        "chunkedgraph_lock_failed_total",
        "Root lock acquisitions that exhausted their retry budget",
        &["kind"],
    )
    .expect("metric registration")
});

pub static LOCK_WAIT_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    try_create_histogram_vec(
        "chunkedgraph_lock_wait_seconds",
        "Time spent acquiring a root lock before success or final failure",
        &["outcome"],
        None,
    )
    .expect("metric registration")
});

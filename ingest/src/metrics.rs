//! Prometheus metrics for the ingest scheduler (§4.J).

use chunkedgraph_o11y::metrics::{
    try_create_int_counter_vec, try_create_int_gauge, IntCounterVec, IntGauge,
};
use once_cell::sync::Lazy;

pub static TASKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    try_create_int_counter_vec(
        "chunkedgraph_ingest_tasks_total",
        "Ingest chunk-build tasks completed, by layer and outcome",
        &["layer", "outcome"],
    )
    .expect("metric registration")
});

pub static PENDING_PARENTS: Lazy<IntGauge> = Lazy::new(|| {
    try_create_int_gauge(
        "chunkedgraph_ingest_pending_parents",
        "Parent chunks still waiting on at least one child to complete",
    )
    .expect("metric registration")
});

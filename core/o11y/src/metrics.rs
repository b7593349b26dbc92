//! Thin wrappers around the default `prometheus` registry.
//!
//! Mirrors the `try_create_*` convention: call these once from a
//! `once_cell::sync::Lazy` static at the call site, log (don't panic) on
//! registration failure, and hand back the metric either way so a
//! misbehaving collector never takes the graph down.
pub use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec};
use prometheus::{exponential_buckets as prom_exponential_buckets, Opts};

pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> prometheus::Result<Vec<f64>> {
    prom_exponential_buckets(start, factor, count)
}

pub fn try_create_int_counter(name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    register(Box::new(counter.clone()), name)?;
    Ok(counter)
}

pub fn try_create_int_counter_vec(
    name: &str,
    help: &str,
    labels: &[&str],
) -> prometheus::Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)?;
    register(Box::new(counter.clone()), name)?;
    Ok(counter)
}

pub fn try_create_int_gauge(name: &str, help: &str) -> prometheus::Result<IntGauge> {
    let gauge = IntGauge::new(name, help)?;
    register(Box::new(gauge.clone()), name)?;
    Ok(gauge)
}

pub fn try_create_int_gauge_vec(
    name: &str,
    help: &str,
    labels: &[&str],
) -> prometheus::Result<IntGaugeVec> {
    let gauge = IntGaugeVec::new(Opts::new(name, help), labels)?;
    register(Box::new(gauge.clone()), name)?;
    Ok(gauge)
}

pub fn try_create_histogram_vec(
    name: &str,
    help: &str,
    labels: &[&str],
    buckets: Option<Vec<f64>>,
) -> prometheus::Result<HistogramVec> {
    let mut opts = prometheus::HistogramOpts::new(name, help);
    if let Some(buckets) = buckets {
        opts = opts.buckets(buckets);
    }
    let histogram = HistogramVec::new(opts, labels)?;
    register(Box::new(histogram.clone()), name)?;
    Ok(histogram)
}

fn register(collector: Box<dyn prometheus::core::Collector>, name: &str) -> prometheus::Result<()> {
    match prometheus::register(collector) {
        Ok(()) => Ok(()),
        Err(prometheus::Error::AlreadyReg) => {
            // Benign in tests, which may construct the same Lazy metric
            // more than once across independent test binaries.
            tracing::debug!(target: "metrics", metric = name, "metric already registered");
            Ok(())
        }
        Err(err) => {
            tracing::warn!(target: "metrics", metric = name, %err, "failed to register metric");
            Err(err)
        }
    }
}

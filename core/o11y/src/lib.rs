//! Logging and metrics setup shared by every `chunkedgraph-*` binary.
//!
//! Kept deliberately small: this is ambient infrastructure, not part of the
//! graph's core logic, and every crate that needs to emit a metric or a log
//! line depends on it rather than reaching for `println!` or rolling its
//! own registry.

pub mod metrics;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Env var consulted for the log filter, analogous to `RUST_LOG` but
/// namespaced so it doesn't collide with dependencies that also read
/// `RUST_LOG`.
pub const LOG_FILTER_ENV: &str = "CHUNKEDGRAPH_LOG";

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive string, e.g. `"info,chunkedgraph_graph=debug"`.
    pub filter: String,
    /// Emit structured JSON instead of the human-readable format; used by
    /// operators piping logs into a collector.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

/// Install a global `tracing` subscriber. Call once, near the top of
/// `main`. Returns the guard for any non-blocking writer so the caller can
/// keep it alive for the process lifetime; there is none for the default
/// stderr writer, so the returned value can usually be dropped immediately.
pub fn init_logging(config: &LogConfig) {
    let env_filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(config.filter.clone()));

    let registry = Registry::default().with(env_filter);
    if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init().ok();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init().ok();
    }
}

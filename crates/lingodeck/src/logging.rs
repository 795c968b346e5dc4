//! Tracing initialization for host processes.
//!
//! The library itself only emits `tracing` events (and `log` records in the
//! db layer); embedding applications call [`init`] once at startup to get
//! both on stderr, filtered through `RUST_LOG`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Installs a global subscriber with an env-filter and a fmt layer, and
/// bridges `log` records into `tracing`. Safe to call more than once; only
/// the first call takes effect.
pub fn init() {
    if tracing_log::LogTracer::init().is_err() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));

    let _ = tracing::subscriber::set_global_default(subscriber);
}

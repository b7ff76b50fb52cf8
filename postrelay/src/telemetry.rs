//! Tracing initialization (fmt subscriber + env filter).
//!
//! Log levels are controlled via the standard `RUST_LOG` environment variable.
//! When unset, the relay logs its own events at `info` together with
//! `tower_http` request/response spans.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Must be called once, before the server starts handling requests.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("postrelay=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

//! Log setup for typed stream servers and clients.
//!
//! Stream events are logged under the `typedstream_core` target: each
//! written record at `trace`, stream completion and client disconnects at
//! `debug`, undecodable records and aborted producers at `warn`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset: stream warnings and lifecycle
/// messages, without per-record noise.
pub const DEFAULT_FILTER: &str = "typedstream_core=info";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter`. With `log_json` every event is
/// one JSON object per line, which keeps server logs in the same NDJSON
/// shape the streams use.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let fmt = tracing_subscriber::fmt::layer().with_target(true);
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_json {
        registry.with(fmt.json()).init();
    } else {
        registry.with(fmt).init();
    }
}

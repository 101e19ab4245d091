//! Ambient logging setup: `tracing` + `tracing-subscriber` only. The
//! teacher's OpenTelemetry/OTLP exporter wiring ships spans to a collector
//! for its CLI's benefit and is dropped here — see DESIGN.md.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a global subscriber for library consumers that don't already have
/// one: an `EnvFilter` read from `RUST_LOG` (default `info`) plus a stderr
/// `fmt` layer. Idempotent — a second call in a process that already has a
/// subscriber installed is a silent no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

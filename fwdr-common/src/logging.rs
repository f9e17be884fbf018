use std::fmt;

use tracing_subscriber::fmt::time::FormatTime;

/// Timestamp formatter matching `%Y-%m-%dT%H:%M:%S%.3f` local time, used in place of
/// `tracing_subscriber`'s default UTC-only `SystemTime` formatter.
pub struct ChronoLocalTime;

impl FormatTime for ChronoLocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"))
    }
}

/// Initializes the global `tracing` subscriber. Call once, at process startup.
///
/// Honors `RUST_LOG` via `EnvFilter`, defaulting to `info` when unset.
pub fn init() {
    use tracing_subscriber::prelude::*;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(ChronoLocalTime)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Logs an internal diagnostic, scoped to the `fwdr::internal` target so operators can
/// filter it independently of wire traffic.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::tracing::$level!(target: "fwdr::internal", $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::tracing::debug!(target: "fwdr::internal", $($arg)+)
    };
}

/// Logs a line received from the client, scoped to the `fwdr::incoming` target.
#[macro_export]
macro_rules! incoming {
    ($($arg:tt)+) => {
        $crate::tracing::trace!(target: "fwdr::incoming", $($arg)+)
    };
}

/// Logs a line sent to the client, scoped to the `fwdr::outgoing` target.
#[macro_export]
macro_rules! outgoing {
    ($($arg:tt)+) => {
        $crate::tracing::trace!(target: "fwdr::outgoing", $($arg)+)
    };
}

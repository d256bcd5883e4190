//! Logging utilities

use crate::{MonitorError, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize logging: console plus a daily rolling JSON-lines file. `RUST_LOG`
/// takes precedence over `log_level`.
pub fn init<P: AsRef<Path>>(log_level: &str, log_file: P) -> Result<()> {
    let log_file = log_file.as_ref();
    let directory = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(directory)?;

    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        directory,
        log_file.file_name().unwrap_or(std::ffi::OsStr::new("fr-monitor.log")),
    );

    let console_layer = fmt::layer().with_target(true).with_line_number(true);

    let file_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| MonitorError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Log one evaluated pair with structured fields
#[macro_export]
macro_rules! log_rated_pair {
    ($level:ident, $rated:expr) => {
        $crate::log_rated_pair!($level, $rated, "Pair evaluated")
    };
    ($level:ident, $rated:expr, $($field:tt)*) => {
        tracing::$level!(
            symbol = %$rated.symbol(),
            long_exchange = %$rated.pair.long_leg().exchange,
            short_exchange = %$rated.pair.short_leg().exchange,
            long_rate = %$rated.long_rate().rate,
            short_rate = %$rated.short_rate().rate,
            differential = %$rated.differential,
            below_threshold = $rated.below_threshold,
            $($field)*
        )
    };
}

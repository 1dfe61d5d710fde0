//! Logging infrastructure.
//!
//! Logs go to stderr so stdout stays clean for answers and JSON output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Initialize the tracing subscriber with stderr output.
///
/// The filter comes from `log_level` when given, otherwise `RUST_LOG`,
/// otherwise `info`.
///
/// # Example
/// ```no_run
/// use kbfilter_core::logging::init_logging;
///
/// init_logging(Some("debug"), true).expect("Failed to initialize logging");
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let env_filter = build_filter(log_level)?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && std::env::var_os("NO_COLOR").is_none());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))?;

    Ok(())
}

/// Resolve the effective `EnvFilter` directive.
fn build_filter(log_level: Option<&str>) -> AppResult<EnvFilter> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = log_level.unwrap_or(&default_level);

    EnvFilter::try_new(filter_str)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", filter_str, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_directives() {
        assert!(build_filter(Some("debug")).is_ok());
        assert!(build_filter(Some("kbfilter_knowledge=trace,info")).is_ok());
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        assert!(build_filter(Some("kbfilter=notalevel")).is_err());
    }
}

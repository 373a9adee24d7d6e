//! Logging setup for Conduit
//!
//! Installs a `tracing-subscriber` registry with an environment filter and a
//! pretty or JSON formatting layer

use conduit_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const FALLBACK_FILTER: &str = "info";

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured filter. Without either,
/// logging falls back to `info`.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed
pub fn init(config: Option<&TelemetryConfig>) -> anyhow::Result<()> {
    let format = config.map(|c| c.format).unwrap_or_default();
    let filter = build_filter(config.map(|c| c.log_filter.as_str()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Pretty => registry.with(fmt_layer).try_init(),
        LogFormat::Json => registry.with(fmt_layer.json().flatten_event(true)).try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::debug!(?format, "tracing initialized");

    Ok(())
}

fn build_filter(configured: Option<&str>) -> EnvFilter {
    if let Ok(directive) = std::env::var(EnvFilter::DEFAULT_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directive)
    {
        return filter;
    }

    configured
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_filter_is_used_without_rust_log() {
        temp_env::with_var_unset("RUST_LOG", || {
            let filter = build_filter(Some("conduit_model=trace"));
            assert_eq!(filter.to_string(), "conduit_model=trace");
        });
    }

    #[test]
    fn rust_log_overrides_configuration() {
        temp_env::with_var("RUST_LOG", Some("warn"), || {
            let filter = build_filter(Some("debug"));
            assert_eq!(filter.to_string(), "warn");
        });
    }

    #[test]
    fn invalid_directive_falls_back_to_info() {
        temp_env::with_var_unset("RUST_LOG", || {
            let filter = build_filter(Some("conduit=verbose"));
            assert_eq!(filter.to_string(), "info");
        });
    }

    #[test]
    fn second_init_is_an_error() {
        let config = TelemetryConfig::default();
        let _ = init(Some(&config));

        assert!(init(Some(&config)).is_err());
    }
}

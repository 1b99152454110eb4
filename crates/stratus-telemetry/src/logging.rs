use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines for interactive use.
    Text,
    /// JSON lines suitable for Vector / Loki / ELK shipping.
    Json,
}

impl LogFormat {
    /// Pick the format from `STRATUS_LOG_FORMAT` (`json` or `text`),
    /// defaulting to text.
    pub fn from_env() -> Self {
        match std::env::var("STRATUS_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise `default_level`
/// (e.g. "info", "stratus_credentials=debug,warn").
///
/// Safe to call multiple times (e.g. in tests) -- subsequent calls are no-ops.
pub fn init(service_name: &str, default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_level(true);

    match format {
        LogFormat::Text => {
            builder.try_init().ok();
        }
        LogFormat::Json => {
            builder.json().try_init().ok();
        }
    }

    tracing::info!(service = service_name, format = ?format, "logging initialised");
}

/// Initialize logging with the format taken from the environment.
pub fn init_logging(service_name: &str, default_level: &str) {
    init(service_name, default_level, LogFormat::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_defaults_to_text() {
        // No env override in the test environment.
        assert_eq!(LogFormat::from_env(), LogFormat::Text);
    }

    #[test]
    fn init_twice_is_harmless() {
        init("stratus-test", "info", LogFormat::Text);
        init("stratus-test", "info", LogFormat::Text);
    }
}

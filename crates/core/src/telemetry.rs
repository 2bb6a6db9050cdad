// Logging setup
//
// Installs the global tracing subscriber: an EnvFilter plus a fmt layer
// writing to stderr, so transcript output on stdout stays clean.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter when neither RUST_LOG nor LOG_LEVEL is set
pub const DEFAULT_LOG_FILTER: &str = "warn,agentchat_core=info,agentchat=info";

/// Configuration for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log filter (e.g., "info", "debug", "agentchat_core=debug")
    pub log_filter: Option<String>,
    /// Include module targets in log lines
    pub with_target: bool,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            with_target: true,
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `LOG_FORMAT`: "json" for JSON lines
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            with_target: true,
            json: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    /// Override the filter (e.g. from a `--quiet` flag)
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    fn env_filter(&self) -> EnvFilter {
        self.log_filter
            .as_ref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at startup. A second call (or a subscriber installed by a test
/// harness) is reported and otherwise ignored.
pub fn init_logging(config: LoggingConfig) {
    let filter = config.env_filter();

    let layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(config.with_target)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.with_target)
            .with_filter(filter)
            .boxed()
    };

    if let Err(e) = tracing_subscriber::registry().with(layer).try_init() {
        eprintln!("Logging already initialized: {}", e);
    }
}

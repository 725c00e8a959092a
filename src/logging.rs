//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Preferred filter variable; `RUST_LOG` is honored as a fallback.
pub const LOG_ENV_VAR: &str = "NACRE_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { format: LogFormat::Plain, default_level: "info".to_string() }
    }
}

/// Installs the global subscriber. Calling it twice is a no-op, which
/// keeps tests that share a process from fighting over it.
pub fn init_logging(config: &LogConfig) {
    let filter = std::env::var(LOG_ENV_VAR)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| config.default_level.clone());

    let builder = tracing_subscriber::fmt().with_env_filter(EnvFilter::new(filter));
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Plain => builder.try_init(),
    };
    let _ = result;
}

//! Logging utilities for the IPVS workspace.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable selecting the log line format.
pub const LOG_FORMAT_ENV: &str = "IPVS_LOG_FORMAT";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log shippers.
    Json,
}

impl LogFormat {
    /// Format named by `IPVS_LOG_FORMAT`; unset or unknown values mean text.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber.
///
/// Uses the RUST_LOG environment variable to control log levels; the default
/// level is INFO. Output goes through the test writer so `cargo test`
/// captures it. Does nothing if a subscriber is already set and returns true
/// only if this call installed it.
pub fn try_init(format: LogFormat) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter());
    let installed = match format {
        LogFormat::Text => registry.with(fmt::layer().with_test_writer()).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_test_writer())
            .try_init(),
    };
    installed.is_ok()
}

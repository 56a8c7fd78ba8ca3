//! Log pipeline initialisation for the rig.
//!
//! Call [`init_tracing`] once at process startup, before the session binds
//! its sockets.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `HAPTIC_LOG_FORMAT=json` | Emit newline-delimited JSON logs. |
//!
//! # Example
//!
//! ```rust,no_run
//! // Hold the guard for the entire lifetime of the process.
//! let _guard = haptic_runtime::telemetry::init_tracing("haptic-rig");
//! ```

use std::io::Write;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Output flavour of the console subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Read `HAPTIC_LOG_FORMAT`; anything but `json` means compact.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("HAPTIC_LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global `tracing` subscriber.
///
/// A second call (or a subscriber installed elsewhere, e.g. by a test
/// harness) leaves the existing one in place.
///
/// The returned [`TracingGuard`] should be held until the process exits; on
/// drop it logs the shutdown and flushes standard output so the last records
/// are not lost when the binary returns from `main`.
pub fn init_tracing(service_name: &str) -> TracingGuard {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let format = LogFormat::from_env();

    let installed = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init(),
    }
    .is_ok();

    if installed {
        tracing::info!(service = service_name, ?format, "tracing initialised");
    }
    TracingGuard {
        service_name: service_name.to_string(),
        installed,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RAII guard
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps the log pipeline's lifetime explicit in `main`.
#[derive(Debug)]
pub struct TracingGuard {
    service_name: String,
    installed: bool,
}

impl TracingGuard {
    /// Whether this call installed the global subscriber.
    pub fn installed(&self) -> bool {
        self.installed
    }
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        if self.installed {
            tracing::info!(service = %self.service_name, "tracing shut down");
        }
        let _ = std::io::stdout().flush();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Compact);
        assert_eq!(LogFormat::parse(None), LogFormat::Compact);
    }

    #[test]
    fn second_init_is_harmless() {
        let first = init_tracing("test-service");
        let second = init_tracing("test-service");
        assert!(!second.installed());
        drop(second);
        drop(first);
    }
}

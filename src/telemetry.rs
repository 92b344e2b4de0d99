//! Tracing subscriber setup.
//!
//! ```rust,ignore
//! use mcp_chat_gateway::telemetry::{init_subscriber, OutputFormat, SubscriberConfig};
//!
//! let _guard = init_subscriber(
//!     SubscriberConfig::builder()
//!         .log_level(tracing::Level::DEBUG)
//!         .output_format(OutputFormat::Json)
//!         .build(),
//! )?;
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::error::{GatewayError, Result};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
    /// Compact JSON
    JsonCompact,
}

impl std::str::FromStr for OutputFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "json-compact" => Ok(Self::JsonCompact),
            other => Err(GatewayError::ConfigurationError(format!(
                "Invalid log format: {other}. Valid options: text, json, json-compact"
            ))),
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Level applied to this crate and the MCP client
    pub log_level: tracing::Level,
    /// Output format
    pub output_format: OutputFormat,
    /// Write to this file instead of stdout
    pub log_file: Option<PathBuf>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            log_file: None,
        }
    }
}

impl SubscriberConfig {
    /// Create a builder
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    /// `EnvFilter` directives for this configuration.
    ///
    /// `RUST_LOG`, when set, wins over the configured level.
    pub fn filter_directives(&self) -> String {
        let level = level_str(self.log_level);
        format!("mcp_chat_gateway={level},rmcp={level}")
    }
}

/// Builder for [`SubscriberConfig`]
#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
    log_file: Option<PathBuf>,
}

impl SubscriberConfigBuilder {
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the level from a string (trace, debug, info, warn, error).
    pub fn log_level_str(mut self, level: &str) -> Result<Self> {
        let level = match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                return Err(GatewayError::ConfigurationError(format!(
                    "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
                )));
            }
        };
        self.log_level = Some(level);
        Ok(self)
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    pub fn build(self) -> SubscriberConfig {
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(tracing::Level::INFO),
            output_format: self.output_format.unwrap_or_default(),
            log_file: self.log_file,
        }
    }
}

fn level_str(level: tracing::Level) -> &'static str {
    match level {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    }
}

/// Install the global subscriber.
///
/// Returns a guard when logging to a file; keep it alive for the lifetime of
/// the process or buffered lines are lost. A subscriber that is already
/// installed is not an error.
pub fn init_subscriber(config: SubscriberConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let (writer, guard) = match &config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path.file_name().ok_or_else(|| {
                GatewayError::ConfigurationError(format!(
                    "Invalid log file path: {}",
                    path.display()
                ))
            })?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (writer, Some(guard))
        }
        None => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
            (writer, Some(guard))
        }
    };
    let ansi = config.log_file.is_none();

    let init_result = match config.output_format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .try_init(),
        OutputFormat::JsonCompact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .try_init(),
    };

    match init_result {
        Ok(()) => Ok(guard),
        Err(e) => {
            if e.to_string().contains("already been set") {
                Ok(None)
            } else {
                Err(GatewayError::ConfigurationError(format!(
                    "Failed to initialize tracing: {e}"
                )))
            }
        }
    }
}

/// Build a configuration from the environment.
///
/// - `GATEWAY_LOG_LEVEL`: trace, debug, info, warn, error
/// - `GATEWAY_LOG_FORMAT`: text, json, json-compact
/// - `GATEWAY_LOG_FILE`: log file path
pub fn config_from_env() -> Result<SubscriberConfig> {
    config_from_lookup(|key| std::env::var(key).ok())
}

fn config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<SubscriberConfig> {
    let mut builder = SubscriberConfig::builder();
    if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
        builder = builder.log_level_str(&level)?;
    }
    if let Some(format) = lookup("GATEWAY_LOG_FORMAT") {
        builder = builder.output_format(format.parse()?);
    }
    if let Some(path) = lookup("GATEWAY_LOG_FILE") {
        builder = builder.log_file(PathBuf::from(path));
    }
    Ok(builder.build())
}

/// Install the subscriber configured by `GATEWAY_LOG_*`.
pub fn init_from_env() -> Result<Option<WorkerGuard>> {
    init_subscriber(config_from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = config_from_lookup(lookup(&[
            ("GATEWAY_LOG_LEVEL", "DEBUG"),
            ("GATEWAY_LOG_FORMAT", "json-compact"),
            ("GATEWAY_LOG_FILE", "/var/log/gateway.log"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert_eq!(config.output_format, OutputFormat::JsonCompact);
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/gateway.log")));
        assert_eq!(
            config.filter_directives(),
            "mcp_chat_gateway=debug,rmcp=debug"
        );
    }

    #[test]
    fn empty_env_gives_defaults() {
        let config = config_from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert_eq!(config.output_format, OutputFormat::Text);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(config_from_lookup(lookup(&[("GATEWAY_LOG_LEVEL", "loud")])).is_err());
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::io;
use std::str::FromStr;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::Directive,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::{ReleaseKitError, Result};

/// Variable selecting the CLI log format (`text`, `json`, `compact`)
pub const LOG_FORMAT_VAR: &str = "RELEASEKIT_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
    /// Whether to include targets, file and line numbers
    pub include_location: bool,
    /// Whether to log span open/close events
    pub include_spans: bool,
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    /// JSON lines for CI log collectors
    Json,
    /// Single-line text without span context
    Compact,
}

impl FromStr for LogFormat {
    type Err = ReleaseKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(ReleaseKitError::config(format!(
                "Unknown log format {}: expected text, json or compact",
                other
            ))),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            include_location: false,
            include_spans: false,
        }
    }
}

impl LogConfig {
    /// CLI settings: `-v` selects debug, `format` comes from [`LOG_FORMAT_VAR`]
    pub fn for_cli(verbose: bool, format: Option<&str>) -> Result<Self> {
        Ok(Self {
            level: if verbose { "debug" } else { "info" }.to_string(),
            format: format.map_or(Ok(LogFormat::Text), str::parse::<LogFormat>)?,
            include_location: verbose,
            include_spans: verbose,
        })
    }
}

fn fmt_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let base = fmt::layer()
        .with_writer(io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Text => base.with_target(config.include_location).boxed(),
        LogFormat::Json => base.json().with_target(true).boxed(),
        LogFormat::Compact => base.compact().with_target(false).boxed(),
    }
}

/// Install the global subscriber.
///
/// Everything is written to stderr so stdout stays free for command output.
/// `RUST_LOG` is honored on top of the configured level.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    parse_log_level(&config.level)?;

    let directive = format!("releasekit_core={}", config.level)
        .parse::<Directive>()
        .map_err(|e| ReleaseKitError::config(format!("Invalid log directive: {}", e)))?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level))
        .add_directive(directive);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer(config))
        .try_init()
        .map_err(|e| ReleaseKitError::config(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

/// Configure logging for the CLI from the verbosity flag and [`LOG_FORMAT_VAR`]
pub fn init_cli_logging(verbose: bool) -> Result<()> {
    let format = std::env::var(LOG_FORMAT_VAR).ok();
    init_logging(&LogConfig::for_cli(verbose, format.as_deref())?)
}

fn parse_log_level(level: &str) -> Result<Level> {
    level.parse::<Level>().map_err(|_| {
        ReleaseKitError::validation(format!(
            "Invalid log level: {}. Valid levels are: trace, debug, info, warn, error",
            level
        ))
    })
}

/// Correlation ID tying together the log lines of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Span fields shared by every log line of one publish or manifest run
pub struct LogContext {
    correlation_id: CorrelationId,
    operation: String,
    component: String,
}

impl LogContext {
    pub fn new(operation: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            operation: operation.into(),
            component: component.into(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "operation",
            correlation_id = %self.correlation_id,
            operation = %self.operation,
            component = %self.component
        )
    }

    /// Log an info message inside this context's span
    pub fn info(&self, message: &str) {
        let _guard = self.span().entered();
        tracing::info!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_cli_config() {
        let quiet = LogConfig::for_cli(false, None).unwrap();
        assert_eq!(quiet.level, "info");
        assert_eq!(quiet.format, LogFormat::Text);
        assert!(!quiet.include_location);

        let verbose = LogConfig::for_cli(true, Some("compact")).unwrap();
        assert_eq!(verbose.level, "debug");
        assert_eq!(verbose.format, LogFormat::Compact);
        assert!(verbose.include_location);

        assert!(LogConfig::for_cli(false, Some("xml")).is_err());
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let first = LogContext::new("publish", "releasekit");
        let second = LogContext::new("publish", "releasekit");
        assert_ne!(first.correlation_id(), second.correlation_id());
        assert_eq!(first.correlation_id().to_string().len(), 36);
    }

    #[test]
    fn test_init_logging_rejects_unknown_level() {
        let config = LogConfig {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert!(init_logging(&config).is_err());
    }
}

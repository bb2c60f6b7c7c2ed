use thiserror::Error;

/// Main result type for releasekit operations
pub type Result<T> = std::result::Result<T, ReleaseKitError>;

/// Main error type for releasekit operations
#[derive(Debug, Error)]
pub enum ReleaseKitError {
    /// External tool errors (sentry-cli, installer)
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Updater manifest errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Network-related errors
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// IO-related errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Required inputs are absent
    #[error("Missing required environment variables: {}", names.join(", "))]
    MissingInputs { names: Vec<String> },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal errors (should not normally occur)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised while driving an external command-line tool
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program could not be spawned at all
    #[error("Failed to run {program}: {message}")]
    Spawn { program: String, message: String },

    /// The program is still unavailable after installation
    #[error("{program} is not available after installation")]
    NotInstalled { program: String },

    /// The install command itself failed
    #[error("Installation failed: {reason}")]
    InstallFailed { reason: String, code: Option<i32> },

    /// The program ran and exited unsuccessfully
    #[error("{}", describe_failure(step, *code, stderr))]
    CommandFailed {
        step: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_failure(step: &str, code: Option<i32>, stderr: &str) -> String {
    let status = code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
    if stderr.is_empty() {
        format!("{} failed (exit status {})", step, status)
    } else {
        format!("{} failed (exit status {}): {}", step, status, stderr)
    }
}

/// Errors raised while assembling updater manifests
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Tag does not fit the channel's tag scheme
    #[error("Expected {expected} for the {channel} channel, got: {tag}")]
    InvalidTag {
        channel: String,
        expected: String,
        tag: String,
    },

    /// No release asset matched
    #[error("Missing release asset: {description}")]
    MissingAsset { description: String },

    /// Several release assets matched where one was required
    #[error("Multiple release assets matched {description}: {candidates}")]
    AmbiguousAsset {
        description: String,
        candidates: String,
    },

    /// The platform filter excluded every target
    #[error("No targets matched --platforms filter: {filter}")]
    NoTargetsMatched { filter: String },

    /// Not a single platform produced an entry
    #[error("No platform assets found - cannot generate manifest")]
    NoPlatformAssets,

    /// The release payload is not usable
    #[error("Invalid release payload: {reason}")]
    InvalidRelease { reason: String },

    /// Unknown channel or format name
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: String, value: String },
}

/// Network-related errors
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request returned a non-success status
    #[error("HTTP request failed: {status_code} - {message}")]
    HttpRequest { status_code: u16, message: String },

    /// Request could not be sent or its body could not be read
    #[error("Transport error: {message}")]
    Transport { message: String },
}

/// Convenience methods for creating specific errors
impl ReleaseKitError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// A failed external command surfaces its own exit status; everything
    /// else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Tool(ToolError::CommandFailed { code: Some(code), .. })
            | Self::Tool(ToolError::InstallFailed { code: Some(code), .. })
                if *code != 0 =>
            {
                *code
            }
            _ => 1,
        }
    }
}

impl ToolError {
    /// Create a spawn error
    pub fn spawn(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Spawn {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create a command failed error
    pub fn command_failed(step: impl Into<String>, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            step: step.into(),
            code,
            stderr: stderr.into(),
        }
    }
}

impl ManifestError {
    /// Create a missing asset error
    pub fn missing_asset(description: impl Into<String>) -> Self {
        Self::MissingAsset {
            description: description.into(),
        }
    }

    /// Create an invalid release error
    pub fn invalid_release(reason: impl Into<String>) -> Self {
        Self::InvalidRelease {
            reason: reason.into(),
        }
    }
}

impl NetworkError {
    /// Create an HTTP request error
    pub fn http_request(status_code: u16, message: impl Into<String>) -> Self {
        Self::HttpRequest {
            status_code,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::HttpRequest {
                status_code: status.as_u16(),
                message: error.to_string(),
            },
            None => Self::Transport {
                message: error.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for ReleaseKitError {
    fn from(error: reqwest::Error) -> Self {
        ReleaseKitError::Network(error.into())
    }
}

impl From<serde_json::Error> for ReleaseKitError {
    fn from(error: serde_json::Error) -> Self {
        ReleaseKitError::Internal {
            message: format!("Serialization error: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let validation_error = ReleaseKitError::validation("Invalid input");
        assert!(matches!(validation_error, ReleaseKitError::Validation { .. }));

        let manifest_error = ManifestError::missing_asset("darwin-aarch64");
        assert!(matches!(manifest_error, ManifestError::MissingAsset { .. }));

        let network_error = NetworkError::http_request(404, "Not found");
        assert!(matches!(network_error, NetworkError::HttpRequest { .. }));
    }

    #[test]
    fn test_error_conversion() {
        let tool_err = ToolError::command_failed("releases finalize", Some(3), "boom");
        let main_err: ReleaseKitError = tool_err.into();
        assert!(matches!(main_err, ReleaseKitError::Tool(_)));
    }

    #[test]
    fn test_missing_inputs_display_lists_every_name() {
        let error = ReleaseKitError::MissingInputs {
            names: vec!["SENTRY_AUTH_TOKEN".to_string(), "SENTRY_DIST".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Missing required environment variables: SENTRY_AUTH_TOKEN, SENTRY_DIST"
        );
    }

    #[test]
    fn test_exit_code_propagates_command_status() {
        let error: ReleaseKitError =
            ToolError::command_failed("sourcemaps upload", Some(42), "").into();
        assert_eq!(error.exit_code(), 42);

        let no_status: ReleaseKitError =
            ToolError::command_failed("sourcemaps upload", None, "killed").into();
        assert_eq!(no_status.exit_code(), 1);

        let missing = ReleaseKitError::MissingInputs { names: vec![] };
        assert_eq!(missing.exit_code(), 1);
    }

    #[test]
    fn test_command_failed_display() {
        let error = ToolError::command_failed("releases new", Some(2), "unauthorized");
        assert_eq!(
            error.to_string(),
            "releases new failed (exit status 2): unauthorized"
        );
    }

    #[test]
    fn test_command_failed_display_without_stderr() {
        let error: ReleaseKitError =
            ToolError::command_failed("debug-files upload", Some(9), "").into();
        assert_eq!(error.to_string(), "debug-files upload failed (exit status 9)");
        assert!(std::error::Error::source(&error).is_none());
    }
}

//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use haremote_config::ConfigError;
use haremote_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the relay at {url}")]
    #[diagnostic(
        code(haremote::connection_failed),
        help(
            "Check that the relay is running and the URL is right.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Not connected to the hub")]
    #[diagnostic(
        code(haremote::not_connected),
        help("The relay dropped the session. Retry the command.")
    )]
    NotConnected,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Relay did not authenticate within {seconds}s")]
    #[diagnostic(
        code(haremote::auth_timeout),
        help(
            "The relay never confirmed the login. Verify the email and password,\n\
             or increase --timeout.\n\
             Run: haremote config set-password --profile {profile}"
        )
    )]
    AuthTimeout { seconds: u64, profile: String },

    #[error("No {what} configured for profile '{profile}'")]
    #[diagnostic(
        code(haremote::no_credentials),
        help(
            "Configure credentials with: haremote config init\n\
             Or set HAREMOTE_EMAIL / HAREMOTE_PASSWORD."
        )
    )]
    NoCredentials { profile: String, what: String },

    #[error("Keyring access failed: {message}")]
    #[diagnostic(code(haremote::keyring))]
    Keyring { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(haremote::not_found),
        help("Run: haremote {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{entity_id} has no usable {control} control")]
    #[diagnostic(
        code(haremote::inert_control),
        help("Run: haremote card {entity_id} to see which controls are active")
    )]
    InertControl { entity_id: String, control: String },

    // ── Hub ──────────────────────────────────────────────────────────
    #[error("Hub error ({code}): {message}")]
    #[diagnostic(code(haremote::hub_error))]
    HubError { code: String, message: String },

    #[error("Request timed out after {millis}ms")]
    #[diagnostic(
        code(haremote::timeout),
        help("Increase command_timeout in your profile or check hub responsiveness.")
    )]
    Timeout { millis: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(haremote::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(haremote::profile_not_found),
        help(
            "Create one with: haremote config init\n\
             Or pass --url and --email directly."
        )
    )]
    ProfileNotFound { name: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(haremote::no_config),
        help(
            "Create one with: haremote config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(haremote::config))]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(haremote::json), help("Service data must be a JSON object."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotConnected => exit_code::CONNECTION,
            Self::AuthTimeout { .. } | Self::NoCredentials { .. } | Self::Keyring { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::InertControl { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotConnected => CliError::NotConnected,

            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed {
                url: "(relay)".into(),
                source: reason.into(),
            },

            CoreError::Timeout { timeout_ms } => CliError::Timeout { millis: timeout_ms },

            CoreError::InvalidEntityId { value } => CliError::Validation {
                field: "entity_id".into(),
                reason: format!("'{value}' is not of the form <domain>.<object_id>"),
            },

            CoreError::EntityNotFound { entity_id } => CliError::NotFound {
                resource_type: "entity".into(),
                identifier: entity_id,
                list_command: "states".into(),
            },

            CoreError::Rejected { message, code } => CliError::HubError {
                code: code.unwrap_or_else(|| "rejected".into()),
                message,
            },

            CoreError::InertControl { entity_id, control } => {
                CliError::InertControl { entity_id, control }
            }

            CoreError::Internal(message) => CliError::HubError {
                code: "internal".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile, what } => CliError::NoCredentials {
                profile,
                what: what.into(),
            },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound { name },
            ConfigError::Keyring(e) => CliError::Keyring {
                message: e.to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                CliError::Config {
                    message: other.to_string(),
                }
            }
        }
    }
}

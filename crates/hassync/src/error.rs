//! CLI error types with miette diagnostics.
//!
//! Maps engine failures into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

/// Exit codes for process termination.
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

    #[error("Could not connect to Home Assistant")]
    #[diagnostic(
        code(hassync::connection_failed),
        help(
            "Check that the instance is running and the URL is a WebSocket endpoint.\n\
             Last status: {detail}"
        )
    )]
    ConnectionFailed { detail: String },

    #[error("Authentication failed")]
    #[diagnostic(
        code(hassync::auth_failed),
        help(
            "Verify your long-lived access token.\n\
             Create one under your Home Assistant profile page, then run:\n\
             hassync config init\n\
             Last status: {detail}"
        )
    )]
    AuthFailed { detail: String },

    #[error("No access token configured for profile '{profile}'")]
    #[diagnostic(
        code(hassync::no_token),
        help(
            "Set HASSYNC_TOKEN, pass --token, or add `token` to the profile in\n\
             the config file (hassync config path)."
        )
    )]
    NoToken { profile: String },

    #[error("Timed out after {seconds}s waiting for the mirror to go live")]
    #[diagnostic(
        code(hassync::timeout),
        help("Increase --timeout or check instance responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Entity '{entity_id}' not found in the mirror")]
    #[diagnostic(
        code(hassync::not_found),
        help("Run: hassync states to see available entities")
    )]
    EntityNotFound { entity_id: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hassync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No connection configured")]
    #[diagnostic(
        code(hassync::no_config),
        help(
            "Create a config file with: hassync config init\n\
             Expected at: {path}\n\
             Or pass --url and --token directly."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(hassync::config_exists),
        help("Edit it directly; the path is: {path}")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(hassync::config))]
    Config(Box<figment::Error>),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoToken { .. } => exit_code::AUTH,
            Self::EntityNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

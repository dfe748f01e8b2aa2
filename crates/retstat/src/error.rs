//! CLI error types with miette diagnostics.
//!
//! Maps config and core errors into user-facing errors with help text
//! and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use retstat_config::ConfigError;
use retstat_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const NO_SESSIONS: i32 = 3;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration ({path})")]
    #[diagnostic(
        code(retstat::config),
        help(
            "Each server needs a code, a connection url, and a password or password_env.\n\
             Pass another file with --config or RETSTAT_CONFIG."
        )
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    // ── Sessions ─────────────────────────────────────────────────────
    #[error("No RETS session could be started")]
    #[diagnostic(
        code(retstat::no_sessions),
        help(
            "Every configured server failed to log in or to resolve its metadata.\n\
             Re-run with -v to see the error of each server."
        )
    )]
    NoSessions,

    #[error("Server '{code}' is not configured")]
    #[diagnostic(code(retstat::unknown_server), help("Configured servers: {available}"))]
    UnknownServer { code: String, available: String },

    #[error("Every stats cycle failed ({failed} server(s))")]
    #[diagnostic(code(retstat::cycle_failed), help("Re-run with -v to see the failing queries."))]
    CyclesFailed { failed: usize },

    #[error(transparent)]
    #[diagnostic(code(retstat::core))]
    Core(CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    #[diagnostic(code(retstat::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML encoding failed: {0}")]
    #[diagnostic(code(retstat::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    pub fn config(path: impl Into<String>, source: ConfigError) -> Self {
        Self::Config {
            path: path.into(),
            source,
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::UnknownServer { .. } => exit_code::CONFIG,
            Self::NoSessions => exit_code::NO_SESSIONS,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoSessions => CliError::NoSessions,
            other => CliError::Core(other),
        }
    }
}

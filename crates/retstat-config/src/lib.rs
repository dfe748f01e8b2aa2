//! Configuration for the retstat poller.
//!
//! A TOML file (platform config dir or an explicit path) overlaid with
//! `RETSTAT_`-prefixed environment variables, validated and translated
//! into `retstat_core::SessionConfig` values.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use retstat_api::DEFAULT_RETS_VERSION;
use retstat_api::transport::DEFAULT_USER_AGENT;
use retstat_core::{ConnectionConfig, CustomQuery, Discovery, SessionConfig, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for server '{server}'")]
    NoCredentials { server: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Polling period per session (humantime, e.g. "60s").
    #[serde(default = "default_period")]
    pub period: String,

    /// Upper bound for each remote call (humantime).
    #[serde(default = "default_timeout")]
    pub timeout: String,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period: default_period(),
            timeout: default_timeout(),
            servers: Vec::new(),
        }
    }
}

fn default_period() -> String {
    "1s".into()
}
fn default_timeout() -> String {
    "10m".into()
}

/// One RETS server to poll.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Session identifier; must be unique.
    pub code: String,

    /// Candidate status field system names.
    #[serde(default)]
    pub status: Vec<String>,

    /// Candidate type field system names.
    #[serde(default, rename = "type")]
    pub types: Vec<String>,

    pub connection: Connection,

    #[serde(default)]
    pub custom: Vec<CustomQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Connection {
    /// Login transaction URL.
    pub url: String,

    #[serde(default)]
    pub username: String,

    /// Password (plaintext; prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    pub user_agent: Option<String>,

    /// Secret for RETS User-Agent authentication.
    pub user_agent_password: Option<String>,

    pub rets_version: Option<String>,

    /// Skip TLS verification.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "retstat", "retstat").map_or_else(
        || PathBuf::from("retstat.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load and validate the configuration.
///
/// An explicit `path` must exist; the default path may be absent, in
/// which case only environment variables contribute.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file not found: {}", p.display()),
            )));
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };
    debug!(path = %path.display(), "loading config");

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("RETSTAT_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Parse a TOML string and validate it. No environment overlay.
pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::string(toml))
        .extract()?;
    config.validate()?;
    Ok(config)
}

// ── Validation & translation ────────────────────────────────────────

impl Config {
    pub fn period(&self) -> Result<Duration, ConfigError> {
        let period = parse_duration("period", &self.period)?;
        if period.is_zero() {
            return Err(ConfigError::invalid("period", "must be greater than zero"));
        }
        Ok(period)
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        let timeout = parse_duration("timeout", &self.timeout)?;
        if timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }
        Ok(timeout)
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.period()?;
        self.timeout()?;

        if self.servers.is_empty() {
            return Err(ConfigError::invalid("servers", "no servers configured"));
        }

        let mut seen = HashSet::new();
        for (i, server) in self.servers.iter().enumerate() {
            if server.code.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("servers[{i}].code"),
                    "must not be empty",
                ));
            }
            if !seen.insert(server.code.as_str()) {
                return Err(ConfigError::invalid(
                    format!("servers[{i}].code"),
                    format!("duplicate server code '{}'", server.code),
                ));
            }
            server.url()?;
            for (j, custom) in server.custom.iter().enumerate() {
                if custom.key.trim().is_empty() {
                    return Err(ConfigError::invalid(
                        format!("servers[{i}].custom[{j}].key"),
                        "must not be empty",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Translate every server into a runtime session config.
    pub fn session_configs(&self) -> Result<Vec<SessionConfig>, ConfigError> {
        let timeout = self.timeout()?;
        self.servers
            .iter()
            .map(|server| server.session_config(timeout))
            .collect()
    }
}

impl ServerConfig {
    fn url(&self) -> Result<Url, ConfigError> {
        let url: Url = self.connection.url.parse().map_err(|e| {
            ConfigError::invalid(
                format!("servers.{}.connection.url", self.code),
                format!("'{}': {e}", self.connection.url),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                format!("servers.{}.connection.url", self.code),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(url)
    }

    /// Resolve the password: `password_env` first, then plaintext.
    fn password(&self) -> Result<SecretString, ConfigError> {
        if let Some(ref name) = self.connection.password_env {
            if let Ok(value) = std::env::var(name) {
                return Ok(SecretString::from(value));
            }
        }
        if let Some(ref pw) = self.connection.password {
            return Ok(SecretString::from(pw.clone()));
        }
        Err(ConfigError::NoCredentials {
            server: self.code.clone(),
        })
    }

    pub fn session_config(&self, timeout: Duration) -> Result<SessionConfig, ConfigError> {
        let conn = &self.connection;
        let tls = if conn.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca) = conn.ca_cert {
            TlsVerification::CustomCa(ca.clone())
        } else {
            TlsVerification::SystemDefaults
        };

        Ok(SessionConfig {
            code: self.code.clone(),
            connection: ConnectionConfig {
                url: self.url()?,
                username: conn.username.clone(),
                password: self.password()?,
                user_agent: conn
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned()),
                user_agent_password: conn.user_agent_password.clone().map(SecretString::from),
                rets_version: conn
                    .rets_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_RETS_VERSION.to_owned()),
                tls,
                timeout,
            },
            discovery: Discovery {
                status_fields: self.status.clone(),
                type_fields: self.types.clone(),
                custom: self.custom.clone(),
            },
        })
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value)
        .map_err(|e| ConfigError::invalid(field, format!("'{value}': {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
period = "60s"

[[servers]]
code = "mls1"
status = ["ListingStatus", "Status"]
type = ["PropertyType"]

[servers.connection]
url = "https://rets.example.com/rets/login"
username = "agent"
password = "secret"

[[servers.custom]]
resource = "Property"
class = "Residential"
key = "luxury"
query = "(ListPrice=1000000+)"
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.period().unwrap(), Duration::from_secs(60));
        assert_eq!(config.timeout().unwrap(), Duration::from_secs(600));
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].types, vec!["PropertyType"]);
    }

    #[test]
    fn translates_to_session_config() {
        let config = parse_config(SAMPLE).unwrap();
        let sessions = config.session_configs().unwrap();
        let session = &sessions[0];

        assert_eq!(session.code, "mls1");
        assert_eq!(session.connection.username, "agent");
        assert_eq!(session.connection.password.expose_secret(), "secret");
        assert_eq!(session.connection.rets_version, DEFAULT_RETS_VERSION);
        assert_eq!(session.connection.user_agent, DEFAULT_USER_AGENT);
        assert!(session.connection.user_agent_password.is_none());
        assert_eq!(session.connection.tls, TlsVerification::SystemDefaults);
        assert_eq!(session.connection.timeout, Duration::from_secs(600));
        assert_eq!(
            session.discovery.status_fields,
            vec!["ListingStatus", "Status"]
        );
        assert_eq!(session.discovery.custom[0].key, "luxury");
    }

    #[test]
    fn insecure_wins_over_ca_cert() {
        let toml = SAMPLE.replace(
            "password = \"secret\"",
            "password = \"secret\"\ninsecure = true\nca_cert = \"/tmp/ca.pem\"",
        );
        let sessions = parse_config(&toml).unwrap().session_configs().unwrap();
        assert_eq!(
            sessions[0].connection.tls,
            TlsVerification::DangerAcceptInvalid
        );
    }

    #[test]
    fn user_agent_password_reaches_session_config() {
        let toml = SAMPLE.replace(
            "password = \"secret\"",
            "password = \"secret\"\nuser_agent = \"Acme/2.0\"\nuser_agent_password = \"ua-secret\"",
        );
        let sessions = parse_config(&toml).unwrap().session_configs().unwrap();
        let conn = &sessions[0].connection;
        assert_eq!(conn.user_agent, "Acme/2.0");
        assert_eq!(
            conn.user_agent_password.as_ref().unwrap().expose_secret(),
            "ua-secret"
        );
    }

    #[test]
    fn rejects_zero_servers() {
        let err = parse_config("period = \"5s\"").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "servers"));
    }

    #[test]
    fn rejects_duplicate_codes() {
        let toml = format!("{SAMPLE}\n{}", &SAMPLE[SAMPLE.find("[[servers]]").unwrap()..]);
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("duplicate server code 'mls1'"));
    }

    #[test]
    fn rejects_bad_period() {
        let zero = SAMPLE.replace("\"60s\"", "\"0s\"");
        assert!(parse_config(&zero).is_err());

        let garbage = SAMPLE.replace("\"60s\"", "\"soon\"");
        let err = parse_config(&garbage).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "period"));
    }

    #[test]
    fn rejects_invalid_url() {
        let toml = SAMPLE.replace("https://rets.example.com/rets/login", "not a url");
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("connection.url"));

        let toml = SAMPLE.replace("https://", "ftp://");
        assert!(parse_config(&toml).is_err());
    }

    #[test]
    fn rejects_empty_custom_key() {
        let toml = SAMPLE.replace("key = \"luxury\"", "key = \"\"");
        let err = parse_config(&toml).unwrap_err();
        assert!(err.to_string().contains("custom[0].key"));
    }

    #[test]
    fn missing_password_is_reported_per_server() {
        let toml = SAMPLE.replace(
            "password = \"secret\"",
            "password_env = \"RETSTAT_TEST_PASSWORD_THAT_IS_NEVER_SET\"",
        );
        let config = parse_config(&toml).unwrap();
        let err = config.session_configs().unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref server } if server == "mls1"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retstat.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.servers[0].code, "mls1");
    }

    #[test]
    fn load_rejects_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

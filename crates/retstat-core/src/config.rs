// ── Runtime session configuration ──
//
// These types describe *how* to reach a RETS server and *what* to look
// for in its metadata. They carry credential data but never touch disk:
// the binary builds a `SessionConfig` per server and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::model::CustomQuery;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Bundled root certificates (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Connection parameters, owned by the transport.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Login transaction URL.
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub user_agent: String,
    /// Enables RETS User-Agent authentication.
    pub user_agent_password: Option<SecretString>,
    pub rets_version: String,
    pub tls: TlsVerification,
    /// Upper bound for each RETS call.
    pub timeout: Duration,
}

/// Which fields carry status/type semantics, and which ad-hoc queries to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Candidate status field system names.
    pub status_fields: Vec<String>,
    /// Candidate type field system names.
    pub type_fields: Vec<String>,
    pub custom: Vec<CustomQuery>,
}

/// Everything needed to open one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Opaque session identifier.
    pub code: String,
    pub connection: ConnectionConfig,
    pub discovery: Discovery,
}

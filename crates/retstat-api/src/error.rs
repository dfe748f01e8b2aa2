use thiserror::Error;

/// RETS reply code for a search that matched nothing.
pub const NO_RECORDS_FOUND: u32 = 20201;

/// RETS reply code for a metadata request whose scope does not exist.
pub const NO_METADATA_FOUND: u32 = 20503;

/// Top-level error type for the `retstat-api` crate.
///
/// Covers every failure mode of a RETS conversation: authentication,
/// transport, server-side reply codes, and COMPACT decoding.
/// `retstat-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, account locked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The login response did not advertise a required transaction URL.
    #[error("Login response is missing the {0} capability")]
    MissingCapability(&'static str),

    /// A transaction was attempted before a successful login.
    #[error("Not logged in")]
    NotLoggedIn,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status outside of authentication.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── RETS ────────────────────────────────────────────────────────
    /// Non-zero `ReplyCode` in the `<RETS>` envelope.
    #[error("RETS error {code}: {text}")]
    Rets { code: u32, text: String },

    // ── Data ────────────────────────────────────────────────────────
    /// COMPACT body could not be decoded, with the raw body for debugging.
    #[error("Decode error: {message}")]
    Decode { message: String, body: String },
}

impl Error {
    pub(crate) fn decode(message: impl Into<String>, body: &str) -> Self {
        Self::Decode {
            message: message.into(),
            body: body.to_owned(),
        }
    }
}

// ── Core error types ──
//
// Domain errors from retstat-core. Consumers never see HTTP status codes
// or COMPACT decode failures directly; the `From<retstat_api::Error>` impl
// translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to RETS server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("RETS call to {url} timed out")]
    Timeout { url: String },

    // ── Server errors ────────────────────────────────────────────────
    #[error("RETS server error: {message}")]
    Api {
        message: String,
        /// The RETS reply code, when the server produced one.
        reply_code: Option<u32>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Session {session}: {source}")]
    Session {
        session: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("No RETS sessions could be started")]
    NoSessions,

    #[error("Publishing failed: {message}")]
    Publish { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Attach the session code to an error.
    pub fn in_session(self, session: &str) -> Self {
        Self::Session {
            session: session.to_owned(),
            source: Box::new(self),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<retstat_api::Error> for CoreError {
    fn from(err: retstat_api::Error) -> Self {
        match err {
            retstat_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            retstat_api::Error::NotLoggedIn => CoreError::AuthenticationFailed {
                message: "not logged in".into(),
            },
            retstat_api::Error::MissingCapability(name) => CoreError::Api {
                message: format!("login response is missing the {name} capability"),
                reply_code: None,
                status: None,
            },
            retstat_api::Error::Transport(ref e) => {
                let url = e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string);
                if e.is_timeout() {
                    CoreError::Timeout { url }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url,
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        reply_code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            retstat_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            retstat_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            retstat_api::Error::Http { status, message } => CoreError::Api {
                message,
                reply_code: None,
                status: Some(status),
            },
            retstat_api::Error::Rets { code, text } => CoreError::Api {
                message: format!("{code}: {text}"),
                reply_code: Some(code),
                status: None,
            },
            retstat_api::Error::Decode { message, body: _ } => {
                CoreError::Internal(format!("Decode error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rets_reply_codes_are_preserved() {
        let err = CoreError::from(retstat_api::Error::Rets {
            code: 20203,
            text: "Miscellaneous Search Error".into(),
        });
        assert!(matches!(
            err,
            CoreError::Api {
                reply_code: Some(20203),
                ..
            }
        ));
    }

    #[test]
    fn session_context_wraps_source() {
        let err = CoreError::NoSessions.in_session("mls1");
        assert_eq!(err.to_string(), "Session mls1: No RETS sessions could be started");
    }
}

// RETS HTTP client
//
// Wraps `reqwest::Client` with RETS-specific headers, HTTP Basic/Digest
// auth, RETS User-Agent auth, reply-code unwrapping, and the three
// transactions the poller needs: Login/Logout, GetMetadata, and
// count-only Search.

use std::sync::{Mutex, MutexGuard, PoisonError};

use digest_auth::{AuthContext, WwwAuthenticateHeader};
use reqwest::header::{AUTHORIZATION, USER_AGENT, WWW_AUTHENTICATE};
use secrecy::ExposeSecret;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::{debug, trace};
use url::{Position, Url};

use crate::auth::{Capabilities, Credentials};
use crate::compact::{self, MetadataRow};
use crate::error::{Error, NO_METADATA_FOUND, NO_RECORDS_FOUND};
use crate::transport::{DEFAULT_USER_AGENT, TransportConfig};

/// Default `RETS-Version` header value.
pub const DEFAULT_RETS_VERSION: &str = "RETS/1.7.2";

/// Cookie carrying the server's session id, used by User-Agent auth.
const SESSION_COOKIE: &str = "RETS-Session-ID";

/// Metadata levels queried during catalog discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum MetadataKind {
    #[strum(serialize = "METADATA-RESOURCE")]
    Resource,
    #[strum(serialize = "METADATA-CLASS")]
    Class,
    #[strum(serialize = "METADATA-TABLE")]
    Table,
    #[strum(serialize = "METADATA-LOOKUP_TYPE")]
    LookupType,
}

impl MetadataKind {
    /// The `Type=` parameter and element name on the wire.
    pub fn wire_name(self) -> &'static str {
        self.into()
    }
}

/// HTTP authentication scheme negotiated with the server.
///
/// No credentials are sent until the server issues a challenge.
#[derive(Debug, Default)]
enum HttpAuth {
    #[default]
    Unchallenged,
    Basic,
    Digest(Box<WwwAuthenticateHeader>),
}

/// The `Authorization` to attach to one request.
enum Authorization {
    Basic,
    Header(String),
}

#[derive(Debug, Default)]
struct AuthState {
    http: HttpAuth,
    session_id: Option<String>,
}

/// Raw HTTP client for one RETS server.
///
/// `login()` returns the [`Capabilities`] and every transaction takes
/// them explicitly. The session cookie lives in the client's cookie jar;
/// the negotiated auth scheme and the RETS session id are kept here.
#[derive(Debug)]
pub struct RetsClient {
    http: reqwest::Client,
    login_url: Url,
    credentials: Credentials,
    rets_version: String,
    user_agent: String,
    auth: Mutex<AuthState>,
}

impl RetsClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `login_url` is the full Login transaction URL of the server.
    pub fn new(
        login_url: Url,
        credentials: Credentials,
        rets_version: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(
            Self::with_client(http, login_url, credentials, rets_version)
                .with_user_agent(transport.user_agent.clone()),
        )
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        login_url: Url,
        credentials: Credentials,
        rets_version: impl Into<String>,
    ) -> Self {
        Self {
            http,
            login_url,
            credentials,
            rets_version: rets_version.into(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            auth: Mutex::new(AuthState::default()),
        }
    }

    /// Override the `User-Agent` sent and used for User-Agent auth.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Authenticate and fetch the session's transaction URLs.
    pub async fn login(&self) -> Result<Capabilities, Error> {
        debug!("logging in at {}", self.login_url);
        self.auth_state().session_id = None;

        let body = self.get(self.login_url.clone()).await?;
        compact::parse_reply(&body)?.into_result().map_err(|e| match e {
            Error::Rets { code, text } => Error::Authentication {
                message: format!("login rejected ({code}): {text}"),
            },
            other => other,
        })?;

        let caps = Capabilities::from_login_body(&body, &self.login_url)?;
        debug!("login successful");
        Ok(caps)
    }

    /// End the session. A server without a Logout capability is a no-op.
    pub async fn logout(&self, caps: &Capabilities) -> Result<(), Error> {
        let Some(url) = caps.logout.clone() else {
            debug!("server has no logout capability");
            return Ok(());
        };

        debug!("logging out at {}", url);
        let _body = self.get(url).await?;
        debug!("logout complete");
        Ok(())
    }

    // ── Transactions ─────────────────────────────────────────────────

    /// Fetch one metadata table in COMPACT format.
    ///
    /// `id` is the scope: `*` for all resources, a resource name for its
    /// classes, `Resource:Class` for a field table, `Resource:Lookup` for
    /// a lookup's values.
    ///
    /// Reply code 20503 (no metadata found) is an empty table.
    pub async fn get_metadata(
        &self,
        caps: &Capabilities,
        kind: MetadataKind,
        id: &str,
    ) -> Result<Vec<MetadataRow>, Error> {
        let mut url = caps.get_metadata.clone();
        url.query_pairs_mut()
            .append_pair("Type", kind.wire_name())
            .append_pair("ID", id)
            .append_pair("Format", "COMPACT");

        let body = self.get(url).await?;
        let reply = compact::parse_reply(&body)?;
        if reply.code == NO_METADATA_FOUND {
            debug!(kind = %kind, id, "server has no metadata for this scope");
            return Ok(Vec::new());
        }
        reply.into_result()?;
        let rows = compact::parse_metadata(&body, kind.wire_name())?;
        trace!(kind = %kind, id, rows = rows.len(), "metadata fetched");
        Ok(rows)
    }

    /// Run a count-only DMQL2 search.
    ///
    /// Reply code 20201 (no records found) is a count of zero.
    pub async fn count(
        &self,
        caps: &Capabilities,
        resource: &str,
        class: &str,
        query: &str,
    ) -> Result<u64, Error> {
        let mut url = caps.search.clone();
        url.query_pairs_mut()
            .append_pair("SearchType", resource)
            .append_pair("Class", class)
            .append_pair("Query", query)
            .append_pair("QueryType", "DMQL2")
            .append_pair("Count", "2")
            .append_pair("Format", "COMPACT-DECODED")
            .append_pair("Limit", "NONE");

        let body = self.get(url).await?;
        let reply = compact::parse_reply(&body)?;
        if reply.code == NO_RECORDS_FOUND {
            return Ok(0);
        }
        reply.into_result()?;
        compact::parse_count(&body)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET and return the body text.
    ///
    /// A 401 carrying a `WWW-Authenticate` challenge switches to the
    /// requested scheme and retries once.
    async fn get(&self, url: Url) -> Result<String, Error> {
        debug!("GET {}", url);

        let mut resp = self.send(&url).await?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED && self.accept_challenge(&resp)? {
            resp = self.send(&url).await?;
        }

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "invalid credentials or session expired (HTTP 401)".into(),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        resp.text().await.map_err(Error::Transport)
    }

    async fn send(&self, url: &Url) -> Result<reqwest::Response, Error> {
        let mut request = self
            .http
            .get(url.clone())
            .header("RETS-Version", &self.rets_version)
            .header(USER_AGENT, &self.user_agent)
            .header("Accept", "*/*");

        let (authorization, session_id) = {
            let mut auth = self.auth_state();
            let authorization = match &mut auth.http {
                HttpAuth::Unchallenged => None,
                HttpAuth::Basic => Some(Authorization::Basic),
                HttpAuth::Digest(challenge) => {
                    let context = AuthContext::new(
                        self.credentials.username.as_str(),
                        self.credentials.password.expose_secret(),
                        &url[Position::BeforePath..],
                    );
                    let answer =
                        challenge
                            .respond(&context)
                            .map_err(|e| Error::Authentication {
                                message: format!("cannot answer digest challenge: {e}"),
                            })?;
                    Some(Authorization::Header(answer.to_header_string()))
                }
            };
            (authorization, auth.session_id.clone())
        };

        request = match authorization {
            None => request,
            Some(Authorization::Basic) => request.basic_auth(
                &self.credentials.username,
                Some(self.credentials.password.expose_secret()),
            ),
            Some(Authorization::Header(header)) => request.header(AUTHORIZATION, header),
        };
        let session_id = session_id.unwrap_or_default();
        if let Some(header) = self.user_agent_authorization(&session_id) {
            request = request.header("RETS-UA-Authorization", header);
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        if let Some(cookie) = resp.cookies().find(|c| c.name() == SESSION_COOKIE) {
            trace!("RETS session id updated");
            self.auth_state().session_id = Some(cookie.value().to_owned());
        }
        Ok(resp)
    }

    /// Adopt the challenge of a 401 response. Returns whether a retry
    /// makes sense.
    fn accept_challenge(&self, resp: &reqwest::Response) -> Result<bool, Error> {
        let challenges: Vec<&str> = resp
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();

        let is_digest = |c: &&str| {
            c.trim_start()
                .get(..6)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        };
        let scheme = if let Some(digest) = challenges.iter().copied().find(is_digest) {
            let challenge = digest_auth::parse(digest).map_err(|e| Error::Authentication {
                message: format!("unusable digest challenge: {e}"),
            })?;
            HttpAuth::Digest(Box::new(challenge))
        } else if challenges.is_empty() {
            return Ok(false);
        } else {
            HttpAuth::Basic
        };

        let name = if matches!(scheme, HttpAuth::Digest(_)) {
            "digest"
        } else {
            "basic"
        };
        debug!(scheme = name, "server requested authentication");
        self.auth_state().http = scheme;
        Ok(true)
    }

    /// `RETS-UA-Authorization` value, when a User-Agent password is set.
    ///
    /// `Digest md5hex(md5hex(UA:password):RequestID:SessionID:Version)`,
    /// with an empty request id.
    fn user_agent_authorization(&self, session_id: &str) -> Option<String> {
        let password = self.credentials.user_agent_password.as_ref()?;
        let a1 = md5::compute(format!("{}:{}", self.user_agent, password.expose_secret()));
        let digest = md5::compute(format!("{a1:x}::{session_id}:{}", self.rets_version));
        Some(format!("Digest {digest:x}"))
    }

    fn auth_state(&self) -> MutexGuard<'_, AuthState> {
        self.auth.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

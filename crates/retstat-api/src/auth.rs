use secrecy::SecretString;
use url::Url;

use crate::compact;
use crate::error::Error;

/// Credentials for authenticating with a RETS server.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    /// Secret for RETS User-Agent authentication, when the server requires it.
    pub user_agent_password: Option<SecretString>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            user_agent_password: None,
        }
    }

    pub fn with_user_agent_password(mut self, password: impl Into<SecretString>) -> Self {
        self.user_agent_password = Some(password.into());
        self
    }
}

/// Transaction URLs advertised by a successful login.
///
/// RETS servers hand these out per session; every later request must
/// use them instead of guessing paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub get_metadata: Url,
    pub search: Url,
    /// Absent on servers that don't support explicit logout.
    pub logout: Option<Url>,
}

impl Capabilities {
    /// Parse the `Key=Value` capability list of a login response.
    ///
    /// Relative paths are resolved against the login URL. Key matching is
    /// case-insensitive since servers disagree on casing.
    pub fn from_login_body(body: &str, login_url: &Url) -> Result<Self, Error> {
        let mut get_metadata = None;
        let mut search = None;
        let mut logout = None;

        for (key, value) in compact::parse_key_values(body) {
            let slot = match key.to_ascii_lowercase().as_str() {
                "getmetadata" => &mut get_metadata,
                "search" => &mut search,
                "logout" => &mut logout,
                _ => continue,
            };
            if !value.is_empty() {
                *slot = Some(login_url.join(&value)?);
            }
        }

        Ok(Self {
            get_metadata: get_metadata.ok_or(Error::MissingCapability("GetMetadata"))?,
            search: search.ok_or(Error::MissingCapability("Search"))?,
            logout,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn login_url() -> Url {
        Url::parse("https://rets.example.com/rets/login").unwrap()
    }

    #[test]
    fn relative_capabilities_resolve_against_login_url() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"ok\"><RETS-RESPONSE>\n\
            GetMetadata=/rets/getmetadata\n\
            Search=search\n\
            Logout=https://other.example.com/logout\n\
            </RETS-RESPONSE></RETS>";
        let caps = Capabilities::from_login_body(body, &login_url()).unwrap();
        assert_eq!(
            caps.get_metadata.as_str(),
            "https://rets.example.com/rets/getmetadata"
        );
        assert_eq!(caps.search.as_str(), "https://rets.example.com/rets/search");
        assert_eq!(
            caps.logout.unwrap().as_str(),
            "https://other.example.com/logout"
        );
    }

    #[test]
    fn keys_are_case_insensitive_and_logout_optional() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"ok\">\n\
            GETMETADATA=/m\n\
            search=/s\n\
            </RETS>";
        let caps = Capabilities::from_login_body(body, &login_url()).unwrap();
        assert_eq!(caps.search.path(), "/s");
        assert!(caps.logout.is_none());
    }

    #[test]
    fn missing_search_is_an_error() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"ok\"><RETS-RESPONSE>\n\
            GetMetadata=/m\n\
            </RETS-RESPONSE></RETS>";
        let err = Capabilities::from_login_body(body, &login_url()).unwrap_err();
        assert!(matches!(err, Error::MissingCapability("Search")));
    }
}

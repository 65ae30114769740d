//! Session identity and server URLs

use reqwest::Url;

use crate::error::SessionError;

/// Guild and channel a session addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    pub guild_id: String,
    pub channel_id: String,
}

impl SessionIdentity {
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
        }
    }

    /// Both ids are present
    pub fn is_complete(&self) -> bool {
        !self.guild_id.is_empty() && !self.channel_id.is_empty()
    }
}

/// URLs of the soundboard server
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    /// Parse an `http`/`https` base URL
    pub fn parse(base_url: &str) -> Result<Self, SessionError> {
        let base = Url::parse(base_url)
            .map_err(|e| SessionError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;
        match base.scheme() {
            "http" | "https" => Ok(Self { base }),
            other => Err(SessionError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }

    /// WebSocket control channel, `ws(s)://<host>/ws?guild=..&channel=..`
    pub fn control_url(&self, identity: &SessionIdentity) -> Url {
        let mut url = self.addressed("ws", identity);
        let scheme = if self.base.scheme() == "https" { "wss" } else { "ws" };
        // http(s) -> ws(s) is always a permitted scheme change
        let _ = url.set_scheme(scheme);
        url
    }

    /// Upload endpoint, `http(s)://<host>/upload?guild=..&channel=..`
    pub fn upload_url(&self, identity: &SessionIdentity) -> Url {
        self.addressed("upload", identity)
    }

    fn addressed(&self, path: &str, identity: &SessionIdentity) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{}/{}", prefix, path));
        url.query_pairs_mut()
            .clear()
            .append_pair("guild", &identity.guild_id)
            .append_pair("channel", &identity.channel_id);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_complete() {
        assert!(SessionIdentity::new("1", "2").is_complete());
        assert!(!SessionIdentity::new("1", "").is_complete());
        assert!(!SessionIdentity::default().is_complete());
    }

    #[test]
    fn test_control_url() {
        let endpoints = Endpoints::parse("http://localhost:8081").unwrap();
        let url = endpoints.control_url(&SessionIdentity::new("123", "456"));
        assert_eq!(url.as_str(), "ws://localhost:8081/ws?guild=123&channel=456");

        let secure = Endpoints::parse("https://example.org/board/").unwrap();
        let url = secure.control_url(&SessionIdentity::new("1", "2"));
        assert_eq!(url.as_str(), "wss://example.org/board/ws?guild=1&channel=2");
    }

    #[test]
    fn test_upload_url_escapes() {
        let endpoints = Endpoints::parse("http://localhost:8081").unwrap();
        let url = endpoints.upload_url(&SessionIdentity::new("a b", "c&d"));
        assert_eq!(url.as_str(), "http://localhost:8081/upload?guild=a+b&channel=c%26d");
    }

    #[test]
    fn test_rejects_bad_base() {
        assert!(Endpoints::parse("not a url").is_err());
        assert!(Endpoints::parse("ftp://example.org").is_err());
    }
}

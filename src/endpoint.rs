use std::fmt;

use thiserror::Error;
use url::{Host, Url};

/// Fixed path of the SHIELD event stream.
pub const EVENTS_PATH: &str = "/v2/events";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("unknown scheme: {0}")]
    UnsupportedScheme(String),
}

impl From<url::ParseError> for ResolveError {
    fn from(err: url::ParseError) -> ResolveError {
        ResolveError::InvalidArgument(format!("could not parse URL: {}", err))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn parse(scheme: &str) -> Result<Scheme, ResolveError> {
        match scheme {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(ResolveError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    /// The websocket scheme used to upgrade a connection made over `self`.
    pub fn upgrade(self) -> &'static str {
        match self {
            Scheme::Http => "ws",
            Scheme::Https => "wss",
        }
    }

    pub fn is_tls(self) -> bool {
        self == Scheme::Https
    }
}

/// A SHIELD core address with scheme and port always filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: Scheme,
    host: Host<String>,
    port: u16,
}

impl Endpoint {
    /// Resolve the command line target. A missing scheme means plain http;
    /// a missing port means the scheme's conventional one.
    pub fn resolve(target: Option<&str>) -> Result<Endpoint, ResolveError> {
        let target = target.map(str::trim).filter(|t| !t.is_empty());
        let target = target.ok_or_else(|| {
            ResolveError::InvalidArgument("positional argument <URL> is required".to_string())
        })?;

        let url = if target.contains("://") {
            Url::parse(target)?
        } else {
            Url::parse(&format!("http://{}", target))?
        };

        let scheme = Scheme::parse(url.scheme())?;
        let host = url
            .host()
            .ok_or(url::ParseError::EmptyHost)?
            .to_owned();
        // Url::port() hides ports equal to the scheme default, which is fine
        // since we would fill in the same value.
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        Ok(Endpoint { scheme, host, port })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &Host<String> {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `scheme://host:port`, the base for API calls.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// `ws(s)://host:port/v2/events`.
    pub fn events_url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.upgrade(),
            self.host,
            self.port,
            EVENTS_PATH
        )
    }

    /// Host name as handed to DNS or the TLS connector (no IPv6 brackets).
    pub fn host_name(&self) -> String {
        match &self.host {
            Host::Domain(domain) => domain.clone(),
            Host::Ipv4(addr) => addr.to_string(),
            Host::Ipv6(addr) => addr.to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

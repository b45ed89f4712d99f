//! Host text to URL normalization
//!
//! Operators type hosts as `logs.example.com`, `10.0.0.5:8080` or a full
//! `https://...` URL. A missing scheme is taken from the destination's TLS
//! flag, so only an explicit scheme can disagree with it.

use reqwest::Url;

use crate::constants::{API_PATH, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn for_tls(use_tls: bool) -> Self {
        if use_tls {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => DEFAULT_HTTP_PORT,
            Scheme::Https => DEFAULT_HTTPS_PORT,
        }
    }

    pub fn is_tls(self) -> bool {
        self == Scheme::Https
    }
}

/// Reasons a host text cannot be turned into an endpoint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("is not a valid address")]
    InvalidUrl,

    #[error("uses unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("has port 0")]
    ZeroPort,
}

/// Scheme, host and effective port of a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn parse(input: &str, use_tls: bool) -> Result<Self, EndpointError> {
        let url = Url::parse(&base_url(input, use_tls)).map_err(|_| EndpointError::InvalidUrl)?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or(EndpointError::InvalidUrl)?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        if port == 0 {
            return Err(EndpointError::ZeroPort);
        }

        Ok(Self { scheme, host, port })
    }

    /// `https://host:port`, the address a TLS identity check connects to
    pub fn tls_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

/// Trimmed host text with a scheme and without a trailing slash
pub fn base_url(input: &str, use_tls: bool) -> String {
    let trimmed = input.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("{}://{}", Scheme::for_tls(use_tls).as_str(), trimmed)
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// The API root below a base URL
pub fn api_url(base: &str) -> Result<Url, EndpointError> {
    Url::parse(&format!("{}{}", base.trim_end_matches('/'), API_PATH))
        .map_err(|_| EndpointError::InvalidUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_from_tls_flag() {
        let plain = Endpoint::parse("logs.example.com", false).unwrap();
        assert_eq!(plain.scheme, Scheme::Http);
        assert_eq!(plain.port, 80);

        let secure = Endpoint::parse(" logs.example.com ", true).unwrap();
        assert_eq!(secure.scheme, Scheme::Https);
        assert_eq!(secure.port, 443);
        assert_eq!(secure.tls_url(), "https://logs.example.com:443");
    }

    #[test]
    fn test_explicit_scheme_and_port_win() {
        let endpoint = Endpoint::parse("http://10.1.2.3:8080/", true).unwrap();
        assert_eq!(endpoint.scheme, Scheme::Http);
        assert_eq!(endpoint.host, "10.1.2.3");
        assert_eq!(endpoint.port, 8080);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(Endpoint::parse("host:0", false), Err(EndpointError::ZeroPort));
        assert_eq!(
            Endpoint::parse("ftp://host", false),
            Err(EndpointError::UnsupportedScheme("ftp".to_string()))
        );
        assert_eq!(Endpoint::parse("host:99999", false), Err(EndpointError::InvalidUrl));
        assert_eq!(Endpoint::parse("", false), Err(EndpointError::InvalidUrl));
    }

    #[test]
    fn test_base_and_api_urls() {
        assert_eq!(base_url("logs.example.com/", true), "https://logs.example.com");
        assert_eq!(base_url("http://logs.example.com//", true), "http://logs.example.com");

        let url = api_url("https://logs.example.com").unwrap();
        assert_eq!(url.as_str(), "https://logs.example.com/api/");
    }
}

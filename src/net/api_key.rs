//! Remote API key check
//!
//! The key is sent as `Authorization: token <key>` to `<base>/api/`. The
//! server's answer is mapped to a small closed set of reasons the operator
//! can act on.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;

use super::endpoint::api_url;
use super::KeyAuthenticator;
use crate::validation::rules::is_valid_api_key;

/// Why a key was not accepted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiKeyError {
    #[error("API key validation failed: Unauthorized")]
    Unauthorized,

    #[error("API key validation failed: wrong key")]
    WrongKey,

    #[error("API key validation failed: Forbidden")]
    Forbidden,

    #[error("Log server not found")]
    NotFound,

    #[error("No response from log server")]
    NoResponse,

    #[error("API key validation failed: {0}")]
    Other(String),
}

impl ApiKeyError {
    /// `None` for the one status that means the key was accepted
    pub fn from_status(status: StatusCode) -> Option<Self> {
        match status {
            StatusCode::OK => None,
            StatusCode::UNAUTHORIZED => Some(ApiKeyError::Unauthorized),
            StatusCode::FORBIDDEN => Some(ApiKeyError::Forbidden),
            StatusCode::NOT_FOUND => Some(ApiKeyError::NotFound),
            other => Some(ApiKeyError::Other(format!("Unexpected status {}", other))),
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ApiKeyError::NoResponse
        } else {
            ApiKeyError::Other(err.to_string())
        }
    }
}

/// Blocking HTTP(S) client that accepts self-signed server certificates
pub struct HttpKeyAuthenticator {
    client: Client,
}

impl HttpKeyAuthenticator {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self { client })
    }
}

impl KeyAuthenticator for HttpKeyAuthenticator {
    fn authenticate(&self, base_url: &str, key: &str) -> std::result::Result<(), ApiKeyError> {
        let key = key.trim();
        if !is_valid_api_key(key) {
            return Err(ApiKeyError::WrongKey);
        }

        let url = api_url(base_url)
            .map_err(|err| ApiKeyError::Other(format!("'{}' {}", base_url, err)))?;
        debug!("Checking API key against {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, format!("token {}", key))
            .header(ACCEPT, "application/json")
            .send()
            .map_err(ApiKeyError::from_transport)?;

        match ApiKeyError::from_status(response.status()) {
            None => {
                info!("API key accepted by {}", url);
                Ok(())
            }
            Some(err) => Err(err),
        }
    }
}
